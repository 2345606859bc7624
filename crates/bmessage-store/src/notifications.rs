use rusqlite::params;

use crate::database::{format_timestamp, parse_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::{Notification, NotificationKind};

impl Database {
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO notifications (id, user_id, kind, from_user_id, conversation_id, message_id, post_id, timestamp, read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                notification.id,
                notification.user_id,
                notification.kind.as_str(),
                notification.from_user_id,
                notification.conversation_id,
                notification.message_id,
                notification.post_id,
                format_timestamp(&notification.timestamp),
                notification.read as i32,
            ],
        )?;
        Ok(())
    }

    /// A user's notifications, newest first.
    pub fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, kind, from_user_id, conversation_id, message_id, post_id, timestamp, read
             FROM notifications WHERE user_id = ?1
             ORDER BY timestamp DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            let kind: String = row.get(2)?;
            let timestamp: String = row.get(7)?;
            let read: i32 = row.get(8)?;
            Ok(Notification {
                id: row.get(0)?,
                user_id: row.get(1)?,
                kind: NotificationKind::parse(&kind).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        format!("unknown notification kind: {kind}").into(),
                    )
                })?,
                from_user_id: row.get(3)?,
                conversation_id: row.get(4)?,
                message_id: row.get(5)?,
                post_id: row.get(6)?,
                timestamp: parse_timestamp(7, &timestamp)?,
                read: read != 0,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn set_notification_read(&self, user_id: &str, notification_id: &str) -> Result<bool> {
        let affected = self.conn()?.execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
            params![notification_id, user_id],
        )?;
        Ok(affected > 0)
    }

    pub fn set_all_notifications_read(&self, user_id: &str) -> Result<usize> {
        let affected = self.conn()?.execute(
            "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
            params![user_id],
        )?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn notification(id: &str, user_id: &str, minutes_ago: i64) -> Notification {
        Notification {
            id: id.into(),
            user_id: user_id.into(),
            kind: NotificationKind::Message,
            from_user_id: "sender".into(),
            conversation_id: Some("c1".into()),
            message_id: Some("m1".into()),
            post_id: None,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            read: false,
        }
    }

    #[test]
    fn listed_newest_first_per_user() {
        let db = Database::open_in_memory().unwrap();
        db.insert_notification(&notification("n1", "u1", 10)).unwrap();
        db.insert_notification(&notification("n2", "u1", 1)).unwrap();
        db.insert_notification(&notification("n3", "u2", 5)).unwrap();

        let ids: Vec<_> = db
            .list_notifications("u1")
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, ["n2", "n1"]);
    }

    #[test]
    fn mark_read_is_scoped_to_owner() {
        let db = Database::open_in_memory().unwrap();
        db.insert_notification(&notification("n1", "u1", 1)).unwrap();

        assert!(!db.set_notification_read("u2", "n1").unwrap());
        assert!(!db.list_notifications("u1").unwrap()[0].read);

        assert!(db.set_notification_read("u1", "n1").unwrap());
        assert!(db.list_notifications("u1").unwrap()[0].read);
    }

    #[test]
    fn mark_all_counts_changes() {
        let db = Database::open_in_memory().unwrap();
        db.insert_notification(&notification("n1", "u1", 3)).unwrap();
        db.insert_notification(&notification("n2", "u1", 2)).unwrap();
        db.insert_notification(&notification("n3", "u2", 1)).unwrap();
        db.set_notification_read("u1", "n1").unwrap();

        assert_eq!(db.set_all_notifications_read("u1").unwrap(), 1);
        assert_eq!(db.set_all_notifications_read("u1").unwrap(), 0);
        assert!(!db.list_notifications("u2").unwrap()[0].read);
    }

    #[test]
    fn feed_notifications_carry_post_id() {
        let db = Database::open_in_memory().unwrap();
        let like = Notification {
            kind: NotificationKind::Like,
            conversation_id: None,
            message_id: None,
            post_id: Some("p1".into()),
            ..notification("n1", "u1", 0)
        };
        db.insert_notification(&like).unwrap();

        let stored = &db.list_notifications("u1").unwrap()[0];
        assert_eq!(stored.kind, NotificationKind::Like);
        assert_eq!(stored.post_id.as_deref(), Some("p1"));
        assert!(stored.conversation_id.is_none());
    }
}
