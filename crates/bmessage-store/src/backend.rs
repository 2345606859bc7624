//! The persistence seam the core writes through.

use crate::error::Result;
use crate::models::{Comment, Group, Message, Notification, Post, PrivateChat, User};

/// Durable storage for users, conversations, the post feed and
/// notifications.
///
/// Every method is a single atomic write (or read). Conversation metadata and
/// messages are written separately so that appending a message never rewrites
/// the whole conversation.
pub trait Backend: Send + Sync {
    fn load_users(&self) -> Result<Vec<User>>;

    /// Insert or replace a user record.
    fn save_user(&self, user: &User) -> Result<()>;

    /// All private chats with their messages in append order.
    fn load_private_chats(&self) -> Result<Vec<PrivateChat>>;

    /// Insert or replace the chat's metadata. Messages are not touched.
    fn save_private_chat(&self, chat: &PrivateChat) -> Result<()>;

    /// All groups with their rosters and messages in append order.
    fn load_groups(&self) -> Result<Vec<Group>>;

    /// Insert or replace the group's metadata, members and admins.
    /// Messages are not touched.
    fn save_group(&self, group: &Group) -> Result<()>;

    /// Append a message to the end of a conversation.
    fn insert_message(&self, conversation_id: &str, message: &Message) -> Result<()>;

    /// Replace a stored message in place, keeping its position.
    fn update_message(&self, conversation_id: &str, message: &Message) -> Result<()>;

    fn remove_message(&self, conversation_id: &str, message_id: &str) -> Result<()>;

    /// All posts in creation order with likes and comments.
    fn load_posts(&self) -> Result<Vec<Post>>;

    /// Insert or replace a post and its likes. Comments are not touched.
    fn save_post(&self, post: &Post) -> Result<()>;

    /// Remove a post with its likes and comments.
    fn remove_post(&self, post_id: &str) -> Result<()>;

    fn insert_comment(&self, post_id: &str, comment: &Comment) -> Result<()>;

    fn append_notification(&self, notification: &Notification) -> Result<()>;

    /// A user's notifications, newest first.
    fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>>;

    /// Returns `true` if the notification existed and belongs to `user_id`.
    fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<bool>;

    /// Returns how many notifications changed state.
    fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize>;
}
