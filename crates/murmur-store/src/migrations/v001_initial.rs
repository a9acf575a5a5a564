//! v001 -- Initial schema creation.
//!
//! Creates the account and membership tables: `users`, `friendships`,
//! `friend_requests`, `chat_groups` and `group_members`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    username    TEXT NOT NULL,
    email       TEXT NOT NULL UNIQUE,
    profile_pic TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL                 -- RFC-3339
);

-- ----------------------------------------------------------------
-- Friendships (one row per direction, kept symmetric by the writer)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friendships (
    user_id   TEXT NOT NULL,
    friend_id TEXT NOT NULL,

    PRIMARY KEY (user_id, friend_id),
    FOREIGN KEY (user_id)   REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (friend_id) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Friend requests, stored on the recipient
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friend_requests (
    recipient_id TEXT NOT NULL,
    from_id      TEXT NOT NULL,
    status       TEXT NOT NULL,               -- 'pending' | 'declined'
    created_at   TEXT NOT NULL,
    declined_at  TEXT,
    position     INTEGER NOT NULL,

    PRIMARY KEY (recipient_id, from_id),
    FOREIGN KEY (recipient_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (from_id)      REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Groups
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_groups (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    name        TEXT NOT NULL,
    profile_pic TEXT NOT NULL DEFAULT '',
    created_by  TEXT NOT NULL,
    created_at  TEXT NOT NULL,

    FOREIGN KEY (created_by) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id TEXT NOT NULL,
    user_id  TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,      -- boolean 0/1

    PRIMARY KEY (group_id, user_id),
    FOREIGN KEY (group_id) REFERENCES chat_groups(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)  REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(user_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
