//! Presence registry: who is online, and over which connection.
//!
//! Holds at most one live [`ConnectionHandle`] per user (last writer wins)
//! plus the group rooms those connections have joined. All operations take
//! the lock for a single step and never across an `.await` on anything else.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use murmur_shared::protocol::ServerEvent;
use murmur_shared::types::{ConnectionId, GroupId, UserId};

/// Outcome of a single push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No live connection for the target.
    Offline,
    /// The connection's outbound queue is full or already closed.
    Dropped,
}

/// Sending half of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub user: UserId,
    tx: mpsc::Sender<ServerEvent>,
}

impl ConnectionHandle {
    /// Queue an event without waiting. A full or closed queue drops the
    /// event; the caller never blocks on a slow client.
    pub fn push(&self, event: ServerEvent) -> Delivery {
        match self.tx.try_send(event) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!(
                    connection = %self.id,
                    user = %self.user,
                    event = event.name(),
                    "Dropping event for slow connection"
                );
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Dropped,
        }
    }
}

#[derive(Default)]
struct Inner {
    by_user: HashMap<UserId, ConnectionHandle>,
    rooms: HashMap<GroupId, HashMap<ConnectionId, ConnectionHandle>>,
}

impl Inner {
    fn purge_from_rooms(&mut self, conn: ConnectionId) {
        self.rooms.retain(|_, members| {
            members.remove(&conn);
            !members.is_empty()
        });
    }

    fn is_current(&self, handle: &ConnectionHandle) -> bool {
        self.by_user
            .get(&handle.user)
            .is_some_and(|current| current.id == handle.id)
    }
}

#[derive(Clone, Default)]
pub struct PresenceRegistry {
    inner: Arc<RwLock<Inner>>,
    next_id: Arc<AtomicU64>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle and its outbound queue. The handle is not
    /// registered until passed to [`register`](Self::register).
    pub fn open(&self, user: UserId, buffer: usize) -> (ConnectionHandle, mpsc::Receiver<ServerEvent>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (ConnectionHandle { id, user, tx }, rx)
    }

    /// Make `handle` the live connection for its user. Returns the handle it
    /// replaced, which is also dropped from every room.
    pub async fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let mut inner = self.inner.write().await;
        let user = handle.user;
        let conn = handle.id;
        let replaced = inner.by_user.insert(user, handle);
        if let Some(old) = &replaced {
            inner.purge_from_rooms(old.id);
            info!(user = %user, old = %old.id, new = %conn, "Connection replaced");
        } else {
            info!(user = %user, connection = %conn, online = inner.by_user.len(), "User online");
        }
        replaced
    }

    /// Remove the entry for `user` only if it is still `conn`. A stale
    /// disconnect never evicts a newer connection. Returns whether anything
    /// was removed.
    pub async fn unregister(&self, user: UserId, conn: ConnectionId) -> bool {
        let mut inner = self.inner.write().await;
        let matches = inner.by_user.get(&user).is_some_and(|h| h.id == conn);
        inner.purge_from_rooms(conn);
        if matches {
            inner.by_user.remove(&user);
            info!(user = %user, connection = %conn, online = inner.by_user.len(), "User offline");
        } else {
            debug!(user = %user, connection = %conn, "Ignoring stale unregister");
        }
        matches
    }

    pub async fn lookup(&self, user: &UserId) -> Option<ConnectionHandle> {
        self.inner.read().await.by_user.get(user).cloned()
    }

    /// Currently connected users, sorted for stable output.
    pub async fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.inner.read().await.by_user.keys().copied().collect();
        users.sort();
        users
    }

    pub async fn connections(&self) -> Vec<ConnectionHandle> {
        self.inner.read().await.by_user.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_user.len()
    }

    /// Add `handle` to a group room. Idempotent. Handles that are no longer
    /// the user's live connection are refused.
    pub async fn join_room(&self, group: GroupId, handle: &ConnectionHandle) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.is_current(handle) {
            return false;
        }
        inner
            .rooms
            .entry(group)
            .or_default()
            .insert(handle.id, handle.clone());
        true
    }

    /// Drop `user`'s live connection from a group room, if present.
    pub async fn leave_room(&self, group: GroupId, user: &UserId) {
        let mut inner = self.inner.write().await;
        let Some(conn) = inner.by_user.get(user).map(|h| h.id) else {
            return;
        };
        let now_empty = match inner.rooms.get_mut(&group) {
            Some(members) => {
                members.remove(&conn);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            inner.rooms.remove(&group);
        }
    }

    pub async fn room_members(&self, group: &GroupId) -> Vec<ConnectionHandle> {
        self.inner
            .read()
            .await
            .rooms
            .get(group)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }
}
