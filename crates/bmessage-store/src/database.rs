//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. The connection sits behind
//! a mutex so one handle can be shared between request handlers and the
//! notification writer.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

use crate::backend::Backend;
use crate::error::{Result, StoreError};
use crate::migrations;
use crate::models::{Comment, Group, Message, Notification, Post, PrivateChat, User};

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;

        // Recommended SQLite settings.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database. Contents vanish on drop.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Run schema migrations.
        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Lock and return the underlying connection.
    ///
    /// Callers should prefer the typed helpers, but direct access is
    /// occasionally needed for transactions or ad-hoc queries.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

// Fixed precision keeps stored timestamps lexicographically ordered.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

impl Backend for Database {
    fn load_users(&self) -> Result<Vec<User>> {
        self.list_users()
    }

    fn save_user(&self, user: &User) -> Result<()> {
        self.upsert_user(user)
    }

    fn load_private_chats(&self) -> Result<Vec<PrivateChat>> {
        self.list_private_chats()
    }

    fn save_private_chat(&self, chat: &PrivateChat) -> Result<()> {
        self.upsert_private_chat(chat)
    }

    fn load_groups(&self) -> Result<Vec<Group>> {
        self.list_groups()
    }

    fn save_group(&self, group: &Group) -> Result<()> {
        self.upsert_group(group)
    }

    fn insert_message(&self, conversation_id: &str, message: &Message) -> Result<()> {
        self.append_message(conversation_id, message)
    }

    fn update_message(&self, conversation_id: &str, message: &Message) -> Result<()> {
        self.replace_message(conversation_id, message)
    }

    fn remove_message(&self, conversation_id: &str, message_id: &str) -> Result<()> {
        self.delete_message(conversation_id, message_id)
    }

    fn load_posts(&self) -> Result<Vec<Post>> {
        self.list_posts()
    }

    fn save_post(&self, post: &Post) -> Result<()> {
        self.upsert_post(post)
    }

    fn remove_post(&self, post_id: &str) -> Result<()> {
        self.delete_post(post_id)
    }

    fn insert_comment(&self, post_id: &str, comment: &Comment) -> Result<()> {
        self.append_comment(post_id, comment)
    }

    fn append_notification(&self, notification: &Notification) -> Result<()> {
        self.insert_notification(notification)
    }

    fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.list_notifications(user_id)
    }

    fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<bool> {
        self.set_notification_read(user_id, notification_id)
    }

    fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize> {
        self.set_all_notifications_read(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn reopen_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        drop(Database::open_at(&path).unwrap());
        let db = Database::open_at(&path).unwrap();

        let version: u32 = db
            .conn()
            .unwrap()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, migrations::CURRENT_VERSION);
    }

    #[test]
    fn timestamps_sort_as_text() {
        let early = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(format_timestamp(&early) < format_timestamp(&late));
        assert_eq!(parse_timestamp(0, &format_timestamp(&late)).unwrap(), late);
    }
}
