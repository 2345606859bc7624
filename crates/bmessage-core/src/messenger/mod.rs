//! The operation surface used by transports.
//!
//! Every operation resolves the conversation, checks access through
//! [`crate::access`], applies the change through [`crate::membership`] or
//! [`crate::lifecycle`] and writes it through the [`ConversationStore`].
//! The implementation is split by resource across the submodules.

mod conversations;
mod feed;
mod groups;
mod views;

use std::sync::Arc;

use bmessage_store::{Backend, Notification, User};
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::directory::{Directory, ProfileUpdate};
use crate::error::{CoreError, Result};
use crate::feed::Feed;
use crate::identity::IdentityResolver;
use crate::notify::NotificationSink;
use crate::store::ConversationStore;

pub use views::{
    ConversationEntry, GroupDetails, LikeOutcome, MemberInfo, MessageView, PostAuthor, PostView,
    Profile, PublicProfile, UserSummary,
};

pub struct Messenger {
    directory: Directory,
    conversations: ConversationStore,
    feed: Feed,
    identity: Arc<dyn IdentityResolver>,
    sink: Arc<dyn NotificationSink>,
}

/// Record counts reported by the server info endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub users_count: usize,
    pub chats_count: usize,
    pub groups_count: usize,
    pub posts_count: usize,
}

impl Messenger {
    /// Load all state from `backend`.
    pub fn open(
        backend: Arc<dyn Backend>,
        identity: Arc<dyn IdentityResolver>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        Ok(Self {
            directory: Directory::load(Arc::clone(&backend))?,
            conversations: ConversationStore::load(Arc::clone(&backend))?,
            feed: Feed::load(backend)?,
            identity,
            sink,
        })
    }

    /// Resolve a credential and record the caller's activity.
    pub fn authenticate(&self, credential: &str) -> Result<User> {
        let user_id = self.identity.resolve(credential)?;
        self.directory.touch(&user_id, Utc::now())
    }

    pub fn user(&self, user_id: &str) -> Result<User> {
        self.directory.require(user_id)
    }

    pub fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<User> {
        self.directory.update_profile(user_id, update)
    }

    pub fn search_users(&self, query: &str) -> Result<Vec<UserSummary>> {
        Ok(self
            .directory
            .search(query)?
            .iter()
            .map(UserSummary::from)
            .collect())
    }

    pub fn notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        Ok(self.conversations.backend().notifications_for(user_id)?)
    }

    /// Marking someone else's or an unknown notification is a silent no-op.
    pub fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<bool> {
        Ok(self
            .conversations
            .backend()
            .mark_notification_read(user_id, notification_id)?)
    }

    pub fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .conversations
            .backend()
            .mark_all_notifications_read(user_id)?)
    }

    pub fn stats(&self) -> Result<Stats> {
        let (chats_count, groups_count) = self.conversations.counts()?;
        Ok(Stats {
            users_count: self.directory.len()?,
            chats_count,
            groups_count,
            posts_count: self.feed.len()?,
        })
    }

    fn sink(&self) -> &dyn NotificationSink {
        self.sink.as_ref()
    }
}

/// Log authorization failures at debug level and pass the error through.
fn rejected<'a>(conversation_id: &'a str, user_id: &'a str) -> impl FnOnce(CoreError) -> CoreError + 'a {
    move |e| {
        if let CoreError::Forbidden(reason) = &e {
            debug!(conversation = %conversation_id, user = %user_id, %reason, "request rejected");
        }
        e
    }
}
