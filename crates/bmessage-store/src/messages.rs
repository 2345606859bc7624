use std::collections::HashMap;

use rusqlite::{params, Connection};

use crate::database::{format_timestamp, parse_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::{FileAttachment, Message};

impl Database {
    pub fn append_message(&self, conversation_id: &str, message: &Message) -> Result<()> {
        let file = message.file.as_ref().map(serde_json::to_string).transpose()?;

        self.conn()?.execute(
            "INSERT INTO messages (id, conversation_id, user_id, text, file, timestamp, edited, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id,
                conversation_id,
                message.user_id,
                message.text,
                file,
                format_timestamp(&message.timestamp),
                message.edited.as_ref().map(format_timestamp),
                message.deleted as i32,
            ],
        )?;
        Ok(())
    }

    // author and timestamp are immutable, only the mutable columns are written
    pub fn replace_message(&self, conversation_id: &str, message: &Message) -> Result<()> {
        let file = message.file.as_ref().map(serde_json::to_string).transpose()?;

        let affected = self.conn()?.execute(
            "UPDATE messages SET text = ?1, file = ?2, edited = ?3, deleted = ?4
             WHERE id = ?5 AND conversation_id = ?6",
            params![
                message.text,
                file,
                message.edited.as_ref().map(format_timestamp),
                message.deleted as i32,
                message.id,
                conversation_id,
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn delete_message(&self, conversation_id: &str, message_id: &str) -> Result<()> {
        let affected = self.conn()?.execute(
            "DELETE FROM messages WHERE id = ?1 AND conversation_id = ?2",
            params![message_id, conversation_id],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn get_messages_for_conversation(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, text, file, timestamp, edited, deleted
             FROM messages WHERE conversation_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id], row_to_message)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

/// Every stored message, grouped by conversation, each list in append order.
pub(crate) fn messages_by_conversation(conn: &Connection) -> Result<HashMap<String, Vec<Message>>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, text, file, timestamp, edited, deleted, conversation_id
         FROM messages ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        let conversation_id: String = row.get(7)?;
        Ok((conversation_id, row_to_message(row)?))
    })?;

    let mut grouped: HashMap<String, Vec<Message>> = HashMap::new();
    for row in rows {
        let (conversation_id, message) = row?;
        grouped.entry(conversation_id).or_default().push(message);
    }
    Ok(grouped)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let file_json: Option<String> = row.get(3)?;
    let ts_str: String = row.get(4)?;
    let edited_str: Option<String> = row.get(5)?;
    let deleted: i32 = row.get(6)?;

    let file = file_json
        .map(|json| serde_json::from_str::<FileAttachment>(&json))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let edited = edited_str
        .map(|s| parse_timestamp(5, &s))
        .transpose()?;

    Ok(Message {
        id: row.get(0)?,
        user_id: row.get(1)?,
        text: row.get(2)?,
        file,
        timestamp: parse_timestamp(4, &ts_str)?,
        edited,
        deleted: deleted != 0,
    })
}
