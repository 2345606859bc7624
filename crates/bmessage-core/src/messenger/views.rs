//! Read models returned to clients.

use bmessage_store::{Group, Message, Post, User, UserSettings};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::conversation::{Conversation, ConversationKind};
use crate::directory::AuthorSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub last_seen: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            last_seen: user.last_seen,
        }
    }
}

/// One row of a user's conversation list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    #[serde(flatten)]
    pub conversation: Conversation,
    /// The other participant of a private chat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_user: Option<UserSummary>,
}

/// A message with its author's display fields attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub user: Option<AuthorSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub is_admin: bool,
    pub is_creator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: Group,
    pub members_info: Vec<MemberInfo>,
}

/// Author decoration on feed entries, looked up when the feed is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostAuthor {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub settings: UserSettings,
}

impl From<&User> for PostAuthor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            settings: user.settings.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub user: Option<PostAuthor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    pub likes: usize,
    pub liked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicProfile {
    #[serde(flatten)]
    pub user: UserSummary,
    pub posts: Vec<Post>,
}
