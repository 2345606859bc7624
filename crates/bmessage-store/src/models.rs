//! Domain records persisted by every [`crate::Backend`].
//!
//! Every struct derives `Serialize` and `Deserialize` with camelCase field
//! names so it can be handed directly to HTTP clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Free-form client preferences, merged key by key on update.
pub type UserSettings = Map<String, Value>;

/// Preferences every new user starts with.
pub fn default_settings() -> UserSettings {
    let mut settings = Map::new();
    settings.insert("hideAvatar".into(), Value::Bool(false));
    settings.insert("hideName".into(), Value::Bool(false));
    settings.insert("theme".into(), Value::String("light".into()));
    settings
}

/// A directory entry. Other records refer to users by `id` only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque, stable identifier handed out by the identity provider.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Avatar URL, empty when unset.
    pub avatar: String,
    /// Last time the user made an authenticated request.
    pub last_seen: DateTime<Utc>,
    /// When the directory first saw this user.
    pub registered: DateTime<Utc>,
    #[serde(default = "default_settings")]
    pub settings: UserSettings,
}

impl User {
    /// A fresh record whose display name defaults to the id.
    pub fn provisioned(id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            avatar: String::new(),
            last_seen: now,
            registered: now,
            settings: default_settings(),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Metadata describing an uploaded file. The core treats it as opaque.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileAttachment {
    pub url: String,
    /// Original file name as uploaded.
    pub name: String,
    /// Top-level MIME type (`image`, `video`, `application`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub mime: String,
    pub size: u64,
    /// Name of the stored file on disk.
    pub filename: String,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    /// Author. Never changes after creation.
    pub user_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAttachment>,
    /// Creation time. Never changes after creation.
    pub timestamp: DateTime<Utc>,
    /// Time of the last edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<DateTime<Utc>>,
    /// Tombstone flag for deleted file-bearing messages.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl Message {
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}

// ---------------------------------------------------------------------------
// Private chat
// ---------------------------------------------------------------------------

/// A 1:1 conversation between exactly two distinct users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrivateChat {
    pub id: String,
    /// Unordered pair; stored in creation order for display.
    pub participants: [String; 2],
    pub messages: Vec<Message>,
    pub created: DateTime<Utc>,
}

impl PrivateChat {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        if !self.has_participant(user_id) {
            return None;
        }
        self.participants
            .iter()
            .find(|p| *p != user_id)
            .map(String::as_str)
    }

    /// Order-independent key identifying the participant pair.
    pub fn pair_key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A multi-member conversation with a creator, admins and an invite link.
///
/// `creator ∈ admins ⊆ members` holds for every stored group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub creator: String,
    pub admins: Vec<String>,
    /// Unique ids in join order.
    pub members: Vec<String>,
    pub allow_members_to_add: bool,
    pub invite_link: String,
    pub messages: Vec<Message>,
    pub created: DateTime<Utc>,
}

impl Group {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|a| a == user_id)
    }

    pub fn is_creator(&self, user_id: &str) -> bool {
        self.creator == user_id
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// A comment under a post. The author's display fields are copied at
/// creation time and never refreshed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// An entry in the public feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    /// Author. Never changes after creation.
    pub user_id: String,
    pub text: String,
    /// Image URL, empty when unset.
    pub image: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<DateTime<Utc>>,
    /// Ids of users who liked the post, in like order.
    pub likes: Vec<String>,
    /// Comments in append order.
    pub comments: Vec<Comment>,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Message,
    GroupAdded,
    GroupRemoved,
    AdminGranted,
    AdminRevoked,
    Like,
    Comment,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::GroupAdded => "group_added",
            Self::GroupRemoved => "group_removed",
            Self::AdminGranted => "admin_granted",
            Self::AdminRevoked => "admin_revoked",
            Self::Like => "like",
            Self::Comment => "comment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "message" => Some(Self::Message),
            "group_added" => Some(Self::GroupAdded),
            "group_removed" => Some(Self::GroupRemoved),
            "admin_granted" => Some(Self::AdminGranted),
            "admin_revoked" => Some(Self::AdminRevoked),
            "like" => Some(Self::Like),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

/// An entry in a user's notification feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// Owner of the feed entry.
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// User whose action produced the entry.
    pub from_user_id: String,
    /// Set for conversation events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Set for feed events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}
