use std::cmp::Ordering;

use bmessage_store::{FileAttachment, Message, NotificationKind, PrivateChat};
use chrono::Utc;
use tracing::info;

use super::{rejected, ConversationEntry, MessageView, Messenger, UserSummary};
use crate::access::{can_delete_message, can_post, can_read};
use crate::conversation::Conversation;
use crate::directory::AuthorSnapshot;
use crate::error::{CoreError, Result};
use crate::lifecycle::{self, Deletion};
use crate::new_id;
use crate::notify::{fan_out, Event};
use crate::store::lock;

impl Messenger {
    /// Every private chat and group `user_id` belongs to, most recently
    /// active first. Conversations without messages come last, newest first.
    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationEntry>> {
        let mut conversations = self.conversations.conversations_of(user_id)?;
        conversations.sort_by(by_recent_activity);

        let mut entries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let other_user = match conversation.as_private() {
                Some(chat) => match chat.other_participant(user_id) {
                    Some(other) => self.directory.get(other)?.as_ref().map(UserSummary::from),
                    None => None,
                },
                None => None,
            };
            entries.push(ConversationEntry {
                kind: conversation.kind(),
                conversation,
                other_user,
            });
        }
        Ok(entries)
    }

    /// Messages in append order, each decorated with the author's current
    /// display fields.
    pub fn messages(&self, conversation_id: &str, user_id: &str) -> Result<Vec<MessageView>> {
        let handle = self.conversations.resolve(conversation_id)?;
        let messages = {
            let conversation = lock(&handle)?;
            if !can_read(&conversation, user_id) {
                return Err(rejected(conversation_id, user_id)(CoreError::forbidden(
                    "no access to this conversation",
                )));
            }
            conversation.messages().to_vec()
        };

        messages
            .into_iter()
            .map(|message| -> Result<MessageView> {
                let user: Option<AuthorSnapshot> = self
                    .directory
                    .get(&message.user_id)?
                    .as_ref()
                    .map(Into::into);
                Ok(MessageView { message, user })
            })
            .collect()
    }

    /// Fails unless `user_id` may post to the conversation. Lets transports
    /// reject a request before storing its attachment.
    pub fn check_post_access(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        let handle = self.conversations.resolve(conversation_id)?;
        let conversation = lock(&handle)?;
        if can_post(&conversation, user_id) {
            Ok(())
        } else {
            Err(rejected(conversation_id, user_id)(CoreError::forbidden(
                "no access to this conversation",
            )))
        }
    }

    /// Append a message. The returned view carries the author's display
    /// fields as they were at creation time.
    pub fn post_message(
        &self,
        conversation_id: &str,
        author_id: &str,
        text: String,
        file: Option<FileAttachment>,
    ) -> Result<MessageView> {
        let handle = self.conversations.resolve(conversation_id)?;
        let mut conversation = lock(&handle)?;
        if !can_post(&conversation, author_id) {
            return Err(rejected(conversation_id, author_id)(CoreError::forbidden(
                "no access to this conversation",
            )));
        }

        let now = Utc::now();
        let message = lifecycle::compose(new_id(), author_id, text, file, now)?;
        self.conversations
            .append_message(&mut conversation, message.clone())?;

        info!(
            conversation = %conversation_id,
            user = %author_id,
            message = %message.id,
            file = message.has_file(),
            "message posted"
        );

        let event = Event {
            kind: NotificationKind::Message,
            actor_id: author_id,
            conversation_id: Some(conversation_id),
            message_id: Some(&message.id),
            post_id: None,
            at: now,
        };
        fan_out(self.sink(), &event, conversation.member_ids());
        drop(conversation);

        let user = Some(self.directory.snapshot(author_id)?);
        Ok(MessageView { message, user })
    }

    /// Replace a message's text. Only its author may do so.
    pub fn edit_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        editor_id: &str,
        text: String,
    ) -> Result<Message> {
        let handle = self.conversations.resolve(conversation_id)?;
        let mut conversation = lock(&handle)?;
        let current = conversation
            .find_message(message_id)
            .ok_or_else(|| CoreError::not_found("Message"))?;

        let edited = lifecycle::edit(current, editor_id, text, Utc::now())
            .map_err(rejected(conversation_id, editor_id))?;
        self.conversations
            .replace_message(&mut conversation, edited.clone())?;

        info!(conversation = %conversation_id, user = %editor_id, message = %message_id, "message edited");
        Ok(edited)
    }

    /// Delete a message: text-only messages are removed, file-bearing ones
    /// are tombstoned.
    pub fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        requester_id: &str,
    ) -> Result<Deletion> {
        let handle = self.conversations.resolve(conversation_id)?;
        let mut conversation = lock(&handle)?;
        let current = conversation
            .find_message(message_id)
            .ok_or_else(|| CoreError::not_found("Message"))?;

        if !can_delete_message(&conversation, current, requester_id) {
            return Err(rejected(conversation_id, requester_id)(CoreError::forbidden(
                "not allowed to delete this message",
            )));
        }

        let deletion = lifecycle::delete(current);
        match &deletion {
            Deletion::Removed => self
                .conversations
                .remove_message(&mut conversation, message_id)?,
            // already a tombstone
            Deletion::Tombstoned(tombstone) if tombstone == current => {}
            Deletion::Tombstoned(tombstone) => self
                .conversations
                .replace_message(&mut conversation, tombstone.clone())?,
        }

        info!(
            conversation = %conversation_id,
            user = %requester_id,
            message = %message_id,
            tombstone = matches!(deletion, Deletion::Tombstoned(_)),
            "message deleted"
        );
        Ok(deletion)
    }

    /// Open (or reopen) the private chat between `user_id` and `target_id`.
    pub fn create_private_chat(&self, user_id: &str, target_id: &str) -> Result<PrivateChat> {
        self.directory.require(target_id)?;
        let (handle, _) =
            self.conversations
                .find_or_create_private_chat(user_id, target_id, Utc::now())?;
        let conversation = lock(&handle)?;
        conversation
            .as_private()
            .cloned()
            .ok_or_else(|| CoreError::Internal("private chat index holds a group".to_string()))
    }
}

/// Newest last message first; conversations without messages come last.
/// Ties fall back to creation time, newest first.
fn by_recent_activity(a: &Conversation, b: &Conversation) -> Ordering {
    match (a.last_activity(), b.last_activity()) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| b.created().cmp(&a.created())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.created().cmp(&a.created()),
    }
}
