//! v002 -- Post feed, user settings and feed notifications.

use rusqlite::Connection;

/// SQL executed when upgrading from version 1 to version 2.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- User settings (JSON object)
-- ----------------------------------------------------------------
ALTER TABLE users ADD COLUMN settings TEXT NOT NULL DEFAULT '{}';

-- ----------------------------------------------------------------
-- Posts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    seq       INTEGER PRIMARY KEY AUTOINCREMENT,  -- creation order
    id        TEXT NOT NULL UNIQUE,
    user_id   TEXT NOT NULL,
    text      TEXT NOT NULL,
    image     TEXT NOT NULL DEFAULT '',
    timestamp TEXT NOT NULL,
    edited    TEXT
);

CREATE TABLE IF NOT EXISTS post_likes (
    post_id  TEXT NOT NULL,
    user_id  TEXT NOT NULL,
    position INTEGER NOT NULL,

    PRIMARY KEY (post_id, user_id),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS post_comments (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT NOT NULL UNIQUE,
    post_id     TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    user_name   TEXT NOT NULL,              -- snapshot at creation
    user_avatar TEXT NOT NULL,
    text        TEXT NOT NULL,
    timestamp   TEXT NOT NULL,

    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_post_comments_post
    ON post_comments(post_id, seq);

-- ----------------------------------------------------------------
-- Notifications: conversation id becomes optional, post id added.
-- SQLite cannot relax NOT NULL in place, so the table is rebuilt.
-- ----------------------------------------------------------------
CREATE TABLE notifications_v2 (
    id              TEXT PRIMARY KEY NOT NULL,
    user_id         TEXT NOT NULL,
    kind            TEXT NOT NULL,
    from_user_id    TEXT NOT NULL,
    conversation_id TEXT,
    message_id      TEXT,
    post_id         TEXT,
    timestamp       TEXT NOT NULL,
    read            INTEGER NOT NULL DEFAULT 0
);

INSERT INTO notifications_v2
    (id, user_id, kind, from_user_id, conversation_id, message_id, timestamp, read)
SELECT id, user_id, kind, from_user_id, conversation_id, message_id, timestamp, read
FROM notifications;

DROP TABLE notifications;
ALTER TABLE notifications_v2 RENAME TO notifications;

CREATE INDEX IF NOT EXISTS idx_notifications_user
    ON notifications(user_id, timestamp DESC);
"#;

/// Apply the feed migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
