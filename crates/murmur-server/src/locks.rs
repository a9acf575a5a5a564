//! Per-record write locks for relationship mutations.
//!
//! Friend and membership edits load whole records, change them and write
//! them back. Two edits touching the same user or group must not interleave
//! across the store awaits, so each edit holds the locks of every record it
//! reads before it loads anything.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct RecordLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

/// Held locks. Dropping it releases them.
pub struct RecordGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every key in `keys`. Keys are taken in sorted order so two
    /// callers locking overlapping sets cannot deadlock.
    pub async fn lock(&self, keys: impl IntoIterator<Item = Uuid>) -> RecordGuard {
        let mut keys: Vec<Uuid> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();

        let slots: Vec<Arc<Mutex<()>>> = {
            let mut map = self.inner.lock().await;
            // Entries only the map still references are idle.
            map.retain(|_, slot| Arc::strong_count(slot) > 1);
            keys.iter()
                .map(|key| map.entry(*key).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(slots.len());
        for slot in slots {
            guards.push(slot.lock_owned().await);
        }
        RecordGuard { _guards: guards }
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}
