//! Creating, editing and deleting messages.
//!
//! These functions compute the next state of a single message. Callers
//! persist the result before applying it to the conversation.

use bmessage_shared::constants::DELETED_FILE_PLACEHOLDER;
use bmessage_store::{FileAttachment, Message};
use chrono::{DateTime, Utc};

use crate::error::{CoreError, Result};

/// A message must carry text or a file.
pub fn compose(
    id: String,
    author_id: &str,
    text: String,
    file: Option<FileAttachment>,
    now: DateTime<Utc>,
) -> Result<Message> {
    if text.is_empty() && file.is_none() {
        return Err(CoreError::validation("message text or file is required"));
    }
    Ok(Message {
        id,
        user_id: author_id.to_string(),
        text,
        file,
        timestamp: now,
        edited: None,
        deleted: false,
    })
}

/// Only the author may edit, an edit may not leave the message empty and
/// fileless, and a tombstone keeps its placeholder text.
pub fn edit(message: &Message, editor_id: &str, text: String, now: DateTime<Utc>) -> Result<Message> {
    if message.user_id != editor_id {
        return Err(CoreError::forbidden("only the author can edit a message"));
    }
    if message.deleted {
        return Err(CoreError::validation("a deleted message cannot be edited"));
    }
    if text.is_empty() && !message.has_file() {
        return Err(CoreError::validation("message text is required"));
    }
    Ok(Message {
        text,
        edited: Some(now),
        ..message.clone()
    })
}

/// Outcome of deleting a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deletion {
    /// Text-only message, dropped from the sequence.
    Removed,
    /// File-bearing message, kept in place with its content cleared.
    Tombstoned(Message),
}

/// Deleting a tombstone again returns it unchanged; it is never removed.
pub fn delete(message: &Message) -> Deletion {
    if message.deleted {
        return Deletion::Tombstoned(message.clone());
    }
    if !message.has_file() {
        return Deletion::Removed;
    }
    Deletion::Tombstoned(Message {
        text: DELETED_FILE_PLACEHOLDER.to_string(),
        file: None,
        deleted: true,
        ..message.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment() -> FileAttachment {
        FileAttachment {
            url: "/uploads/1-a-photo.png".into(),
            name: "photo.png".into(),
            kind: "image".into(),
            mime: "image/png".into(),
            size: 1024,
            filename: "1-a-photo.png".into(),
        }
    }

    #[test]
    fn empty_fileless_message_is_rejected() {
        let result = compose("m1".into(), "u1", String::new(), None, Utc::now());
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn empty_text_with_file_is_accepted() {
        let message = compose("m1".into(), "u1", String::new(), Some(attachment()), Utc::now()).unwrap();
        assert!(message.has_file());
        assert!(!message.deleted);
    }

    #[test]
    fn edit_by_other_user_is_forbidden() {
        let original = compose("m1".into(), "u1", "hello".into(), None, Utc::now()).unwrap();
        let result = edit(&original, "u2", "changed".into(), Utc::now());
        assert!(matches!(result, Err(CoreError::Forbidden(_))));
    }

    #[test]
    fn edit_keeps_author_and_timestamp() {
        let created = Utc::now();
        let original = compose("m1".into(), "u1", "hello".into(), None, created).unwrap();
        let later = created + chrono::Duration::seconds(30);

        let edited = edit(&original, "u1", "hello again".into(), later).unwrap();
        assert_eq!(edited.text, "hello again");
        assert_eq!(edited.edited, Some(later));
        assert_eq!(edited.timestamp, created);
        assert_eq!(edited.user_id, "u1");
    }

    #[test]
    fn edit_cannot_empty_a_text_message() {
        let original = compose("m1".into(), "u1", "hello".into(), None, Utc::now()).unwrap();
        assert!(matches!(
            edit(&original, "u1", String::new(), Utc::now()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn delete_tombstones_files_and_removes_text() {
        let text = compose("m1".into(), "u1", "hello".into(), None, Utc::now()).unwrap();
        assert_eq!(delete(&text), Deletion::Removed);

        let with_file = compose("m2".into(), "u1", "look".into(), Some(attachment()), Utc::now()).unwrap();
        match delete(&with_file) {
            Deletion::Tombstoned(tombstone) => {
                assert_eq!(tombstone.id, "m2");
                assert_eq!(tombstone.text, DELETED_FILE_PLACEHOLDER);
                assert!(tombstone.file.is_none());
                assert!(tombstone.deleted);
            }
            Deletion::Removed => panic!("file-bearing message must be tombstoned"),
        }
    }

    fn tombstone() -> Message {
        let with_file = compose("m1".into(), "u1", "look".into(), Some(attachment()), Utc::now()).unwrap();
        match delete(&with_file) {
            Deletion::Tombstoned(tombstone) => tombstone,
            Deletion::Removed => panic!("file-bearing message must be tombstoned"),
        }
    }

    #[test]
    fn tombstone_cannot_be_edited() {
        let tombstone = tombstone();
        assert!(matches!(
            edit(&tombstone, "u1", "back again".into(), Utc::now()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn deleting_a_tombstone_keeps_it() {
        let tombstone = tombstone();
        assert_eq!(delete(&tombstone), Deletion::Tombstoned(tombstone.clone()));
    }
}
