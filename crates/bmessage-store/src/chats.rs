//! Persistence for [`PrivateChat`] records.

use rusqlite::params;

use crate::database::{format_timestamp, parse_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::messages::messages_by_conversation;
use crate::models::PrivateChat;

impl Database {
    /// Insert a chat. The participant pair is immutable, so an existing row
    /// is left as is.
    pub fn upsert_private_chat(&self, chat: &PrivateChat) -> Result<()> {
        let [a, b] = &chat.participants;
        let (low, high) = PrivateChat::pair_key(a, b);

        self.conn()?.execute(
            "INSERT INTO private_chats (id, user_a, user_b, pair_low, pair_high, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO NOTHING",
            params![
                chat.id,
                a,
                b,
                low,
                high,
                format_timestamp(&chat.created),
            ],
        )?;
        Ok(())
    }

    /// All private chats, oldest first, with messages attached.
    pub fn list_private_chats(&self) -> Result<Vec<PrivateChat>> {
        let conn = self.conn()?;
        let mut messages = messages_by_conversation(&conn)?;

        let mut stmt = conn.prepare(
            "SELECT id, user_a, user_b, created_at FROM private_chats ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let created: String = row.get(3)?;
            Ok(PrivateChat {
                id: row.get(0)?,
                participants: [row.get(1)?, row.get(2)?],
                messages: Vec::new(),
                created: parse_timestamp(3, &created)?,
            })
        })?;

        let mut chats = Vec::new();
        for row in rows {
            let mut chat = row.map_err(StoreError::Sqlite)?;
            chat.messages = messages.remove(&chat.id).unwrap_or_default();
            chats.push(chat);
        }
        Ok(chats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chat(id: &str, a: &str, b: &str) -> PrivateChat {
        PrivateChat {
            id: id.into(),
            participants: [a.into(), b.into()],
            messages: Vec::new(),
            created: Utc::now(),
        }
    }

    #[test]
    fn stores_participants_in_creation_order() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_private_chat(&chat("c1", "u2", "u1")).unwrap();

        let chats = db.list_private_chats().unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].participants, ["u2".to_string(), "u1".to_string()]);
    }

    #[test]
    fn pair_is_unique_in_either_order() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_private_chat(&chat("c1", "u1", "u2")).unwrap();

        assert!(db.upsert_private_chat(&chat("c2", "u2", "u1")).is_err());
    }

    #[test]
    fn loads_messages_with_chat() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_private_chat(&chat("c1", "u1", "u2")).unwrap();
        db.append_message(
            "c1",
            &crate::models::Message {
                id: "m1".into(),
                user_id: "u1".into(),
                text: "hi".into(),
                file: None,
                timestamp: Utc::now(),
                edited: None,
                deleted: false,
            },
        )
        .unwrap();

        let chats = db.list_private_chats().unwrap();
        assert_eq!(chats[0].messages.len(), 1);
        assert_eq!(chats[0].messages[0].text, "hi");
    }
}
