//! v001 -- Initial schema creation.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id         TEXT PRIMARY KEY NOT NULL,
    name       TEXT NOT NULL,
    avatar     TEXT NOT NULL DEFAULT '',
    last_seen  TEXT NOT NULL,                 -- RFC-3339, micros
    registered TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Private chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS private_chats (
    id         TEXT PRIMARY KEY NOT NULL,
    user_a     TEXT NOT NULL,                 -- participants in creation order
    user_b     TEXT NOT NULL,
    pair_low   TEXT NOT NULL,                 -- normalized pair
    pair_high  TEXT NOT NULL,
    created_at TEXT NOT NULL,

    UNIQUE (pair_low, pair_high)
);

-- ----------------------------------------------------------------
-- Groups
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS groups (
    id                   TEXT PRIMARY KEY NOT NULL,
    name                 TEXT NOT NULL,
    avatar               TEXT NOT NULL DEFAULT '',
    creator              TEXT NOT NULL,
    allow_members_to_add INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    invite_link          TEXT NOT NULL UNIQUE,
    created_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id TEXT NOT NULL,
    user_id  TEXT NOT NULL,
    position INTEGER NOT NULL,

    PRIMARY KEY (group_id, user_id),
    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS group_admins (
    group_id TEXT NOT NULL,
    user_id  TEXT NOT NULL,
    position INTEGER NOT NULL,

    PRIMARY KEY (group_id, user_id),
    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Messages (private chats and groups share one table)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,  -- append order
    id              TEXT NOT NULL UNIQUE,
    conversation_id TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    text            TEXT NOT NULL,
    file            TEXT,                               -- JSON attachment
    timestamp       TEXT NOT NULL,
    edited          TEXT,
    deleted         INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(conversation_id, seq);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id              TEXT PRIMARY KEY NOT NULL,
    user_id         TEXT NOT NULL,
    kind            TEXT NOT NULL,
    from_user_id    TEXT NOT NULL,
    conversation_id TEXT NOT NULL,
    message_id      TEXT,
    timestamp       TEXT NOT NULL,
    read            INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_notifications_user
    ON notifications(user_id, timestamp DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
