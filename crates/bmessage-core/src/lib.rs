//! # bmessage-core
//!
//! Conversations, membership, the message lifecycle and the post feed.
//!
//! The pure policy lives in [`access`], [`membership`], [`lifecycle`] and
//! [`feed`] and operates on plain records. [`ConversationStore`],
//! [`feed::Feed`] and [`Directory`] own the shared in-memory state and write
//! through a [`bmessage_store::Backend`]. [`Messenger`] ties them together
//! into the operation surface the server exposes.

pub mod access;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod feed;
pub mod identity;
pub mod lifecycle;
pub mod membership;
pub mod messenger;
pub mod notify;
pub mod store;

pub use conversation::{Conversation, ConversationKind};
pub use directory::{AuthorSnapshot, Directory, ProfileUpdate};
pub use error::{CoreError, Result};
pub use identity::{IdentityResolver, SessionKeyResolver};
pub use lifecycle::Deletion;
pub use membership::{GroupDraft, GroupSettingsPatch};
pub use messenger::{
    ConversationEntry, GroupDetails, LikeOutcome, MemberInfo, MessageView, Messenger, PostAuthor,
    PostView, Profile, PublicProfile, Stats, UserSummary,
};
pub use notify::{NoopSink, NotificationSink};
pub use store::{ConversationHandle, ConversationStore};

/// A fresh, time-ordered identifier.
pub(crate) fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
