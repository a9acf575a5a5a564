//! Schema migrations, applied in order when a [`Database`] is opened.
//!
//! `PRAGMA user_version` records the last applied step, so each migration
//! runs exactly once per database file.
//!
//! [`Database`]: crate::Database

pub mod v001_initial;
pub mod v002_messages_notifications;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

type Step = fn(&Connection) -> rusqlite::Result<()>;

/// Ordered migration steps. Version `n` is `MIGRATIONS[n - 1]`.
const MIGRATIONS: &[(&str, Step)] = &[
    ("v001_initial", v001_initial::up),
    ("v002_messages_notifications", v002_messages_notifications::up),
];

/// Schema version after every migration has run.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{current} is newer than this build (v{CURRENT_VERSION})"
        )));
    }

    for (version, (name, up)) in (1u32..).zip(MIGRATIONS) {
        if version <= current {
            continue;
        }
        tracing::info!(version, name, "applying migration");
        up(conn).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        conn.pragma_update(None, "user_version", version)?;
    }

    Ok(())
}
