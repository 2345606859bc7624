//! The two conversation variants behind one addressable type.

use bmessage_store::{Group, Message, PrivateChat};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Private,
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A private chat or a group, addressed by the same id space.
///
/// Serializes as the bare record of whichever variant it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Conversation {
    Private(PrivateChat),
    Group(Group),
}

impl Conversation {
    pub fn id(&self) -> &str {
        match self {
            Self::Private(chat) => &chat.id,
            Self::Group(group) => &group.id,
        }
    }

    pub fn kind(&self) -> ConversationKind {
        match self {
            Self::Private(_) => ConversationKind::Private,
            Self::Group(_) => ConversationKind::Group,
        }
    }

    pub fn created(&self) -> DateTime<Utc> {
        match self {
            Self::Private(chat) => chat.created,
            Self::Group(group) => group.created,
        }
    }

    pub fn messages(&self) -> &[Message] {
        match self {
            Self::Private(chat) => &chat.messages,
            Self::Group(group) => &group.messages,
        }
    }

    pub(crate) fn messages_mut(&mut self) -> &mut Vec<Message> {
        match self {
            Self::Private(chat) => &mut chat.messages,
            Self::Group(group) => &mut group.messages,
        }
    }

    /// Participants of a private chat or members of a group.
    pub fn member_ids(&self) -> &[String] {
        match self {
            Self::Private(chat) => chat.participants.as_slice(),
            Self::Group(group) => group.members.as_slice(),
        }
    }

    pub fn find_message(&self, message_id: &str) -> Option<&Message> {
        self.messages().iter().find(|m| m.id == message_id)
    }

    pub(crate) fn message_position(&self, message_id: &str) -> Option<usize> {
        self.messages().iter().position(|m| m.id == message_id)
    }

    /// Timestamp of the newest message, if any.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.messages().last().map(|m| m.timestamp)
    }

    pub fn as_private(&self) -> Option<&PrivateChat> {
        match self {
            Self::Private(chat) => Some(chat),
            Self::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(group) => Some(group),
            Self::Private(_) => None,
        }
    }

    pub(crate) fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Self::Group(group) => Some(group),
            Self::Private(_) => None,
        }
    }
}
