use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    sender_id   TEXT NOT NULL,
    receiver_id TEXT,                         -- direct target
    group_id    TEXT,                         -- group target
    text        TEXT,
    image       TEXT,
    created_at  TEXT NOT NULL,

    CHECK ((receiver_id IS NULL) <> (group_id IS NULL)),
    FOREIGN KEY (sender_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_direct
    ON messages(sender_id, receiver_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_group
    ON messages(group_id, created_at);

CREATE TABLE IF NOT EXISTS notifications (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    recipient_id TEXT NOT NULL,
    sender_id    TEXT NOT NULL,
    kind         TEXT NOT NULL,
    content      TEXT NOT NULL,
    is_read      INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    related_id   TEXT,
    metadata     TEXT NOT NULL DEFAULT '{}',  -- JSON object
    created_at   TEXT NOT NULL,

    FOREIGN KEY (recipient_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient
    ON notifications(recipient_id, created_at DESC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
