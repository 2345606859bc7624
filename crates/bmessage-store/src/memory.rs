//! In-process [`Backend`] used by tests and throwaway instances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::backend::Backend;
use crate::error::{Result, StoreError};
use crate::models::{Comment, Group, Message, Notification, Post, PrivateChat, User};

#[derive(Default)]
struct State {
    users: Vec<User>,
    chats: Vec<PrivateChat>,
    groups: Vec<Group>,
    messages: HashMap<String, Vec<Message>>,
    posts: Vec<Post>,
    notifications: Vec<Notification>,
}

/// Keeps every record in memory. Writes can be made to fail on demand with
/// [`MemoryBackend::fail_writes`].
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    failing: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// While `true`, every write returns [`StoreError::Unavailable`] and
    /// leaves the stored data untouched.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn writable(&self) -> Result<MutexGuard<'_, State>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.state()
    }
}

impl Backend for MemoryBackend {
    fn load_users(&self) -> Result<Vec<User>> {
        Ok(self.state()?.users.clone())
    }

    fn save_user(&self, user: &User) -> Result<()> {
        let mut state = self.writable()?;
        match state.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user.clone(),
            None => state.users.push(user.clone()),
        }
        Ok(())
    }

    fn load_private_chats(&self) -> Result<Vec<PrivateChat>> {
        let state = self.state()?;
        Ok(state
            .chats
            .iter()
            .map(|chat| PrivateChat {
                messages: state.messages.get(&chat.id).cloned().unwrap_or_default(),
                ..chat.clone()
            })
            .collect())
    }

    fn save_private_chat(&self, chat: &PrivateChat) -> Result<()> {
        let mut state = self.writable()?;
        let record = PrivateChat {
            messages: Vec::new(),
            ..chat.clone()
        };
        match state.chats.iter_mut().find(|c| c.id == chat.id) {
            Some(existing) => *existing = record,
            None => state.chats.push(record),
        }
        Ok(())
    }

    fn load_groups(&self) -> Result<Vec<Group>> {
        let state = self.state()?;
        Ok(state
            .groups
            .iter()
            .map(|group| Group {
                messages: state.messages.get(&group.id).cloned().unwrap_or_default(),
                ..group.clone()
            })
            .collect())
    }

    fn save_group(&self, group: &Group) -> Result<()> {
        let mut state = self.writable()?;
        let record = Group {
            messages: Vec::new(),
            ..group.clone()
        };
        match state.groups.iter_mut().find(|g| g.id == group.id) {
            Some(existing) => *existing = record,
            None => state.groups.push(record),
        }
        Ok(())
    }

    fn insert_message(&self, conversation_id: &str, message: &Message) -> Result<()> {
        self.writable()?
            .messages
            .entry(conversation_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    fn update_message(&self, conversation_id: &str, message: &Message) -> Result<()> {
        let mut state = self.writable()?;
        let stored = state
            .messages
            .get_mut(conversation_id)
            .and_then(|list| list.iter_mut().find(|m| m.id == message.id))
            .ok_or(StoreError::NotFound)?;
        *stored = message.clone();
        Ok(())
    }

    fn remove_message(&self, conversation_id: &str, message_id: &str) -> Result<()> {
        let mut state = self.writable()?;
        let list = state
            .messages
            .get_mut(conversation_id)
            .ok_or(StoreError::NotFound)?;
        let index = list
            .iter()
            .position(|m| m.id == message_id)
            .ok_or(StoreError::NotFound)?;
        list.remove(index);
        Ok(())
    }

    fn load_posts(&self) -> Result<Vec<Post>> {
        Ok(self.state()?.posts.clone())
    }

    fn save_post(&self, post: &Post) -> Result<()> {
        let mut state = self.writable()?;
        match state.posts.iter_mut().find(|p| p.id == post.id) {
            Some(existing) => {
                let comments = std::mem::take(&mut existing.comments);
                *existing = Post {
                    comments,
                    ..post.clone()
                };
            }
            None => state.posts.push(Post {
                comments: Vec::new(),
                ..post.clone()
            }),
        }
        Ok(())
    }

    fn remove_post(&self, post_id: &str) -> Result<()> {
        let mut state = self.writable()?;
        let index = state
            .posts
            .iter()
            .position(|p| p.id == post_id)
            .ok_or(StoreError::NotFound)?;
        state.posts.remove(index);
        Ok(())
    }

    fn insert_comment(&self, post_id: &str, comment: &Comment) -> Result<()> {
        self.writable()?
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or(StoreError::NotFound)?
            .comments
            .push(comment.clone());
        Ok(())
    }

    fn append_notification(&self, notification: &Notification) -> Result<()> {
        self.writable()?.notifications.push(notification.clone());
        Ok(())
    }

    fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>> {
        let state = self.state()?;
        let mut feed: Vec<_> = state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order (newest first) on equal timestamps.
        feed.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(feed)
    }

    fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<bool> {
        let mut state = self.writable()?;
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
        {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize> {
        let mut state = self.writable()?;
        let mut changed = 0;
        for n in state
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            n.read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(id: &str) -> Message {
        Message {
            id: id.into(),
            user_id: "u1".into(),
            text: "hi".into(),
            file: None,
            timestamp: Utc::now(),
            edited: None,
            deleted: false,
        }
    }

    #[test]
    fn messages_are_attached_on_load() {
        let backend = MemoryBackend::new();
        let chat = PrivateChat {
            id: "c1".into(),
            participants: ["u1".into(), "u2".into()],
            messages: vec![message("ignored")],
            created: Utc::now(),
        };
        backend.save_private_chat(&chat).unwrap();
        backend.insert_message("c1", &message("m1")).unwrap();
        backend.insert_message("c1", &message("m2")).unwrap();
        backend.remove_message("c1", "m1").unwrap();

        let chats = backend.load_private_chats().unwrap();
        let ids: Vec<_> = chats[0].messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m2"]);
    }

    #[test]
    fn failing_writes_leave_state_untouched() {
        let backend = MemoryBackend::new();
        backend.insert_message("c1", &message("m1")).unwrap();

        backend.fail_writes(true);
        assert!(matches!(
            backend.insert_message("c1", &message("m2")),
            Err(StoreError::Unavailable)
        ));
        assert!(backend.remove_message("c1", "m1").is_err());

        backend.fail_writes(false);
        assert!(backend.remove_message("c1", "m1").is_ok());
    }

    #[test]
    fn saving_a_post_keeps_its_comments() {
        let backend = MemoryBackend::new();
        let mut post = Post {
            id: "p1".into(),
            user_id: "u1".into(),
            text: "hello".into(),
            image: String::new(),
            timestamp: Utc::now(),
            edited: None,
            likes: Vec::new(),
            comments: Vec::new(),
        };
        backend.save_post(&post).unwrap();
        backend
            .insert_comment(
                "p1",
                &Comment {
                    id: "c1".into(),
                    user_id: "u2".into(),
                    user_name: "u2".into(),
                    user_avatar: String::new(),
                    text: "first".into(),
                    timestamp: Utc::now(),
                },
            )
            .unwrap();

        post.likes.push("u2".into());
        backend.save_post(&post).unwrap();

        let stored = &backend.load_posts().unwrap()[0];
        assert_eq!(stored.likes, ["u2"]);
        assert_eq!(stored.comments.len(), 1);
    }

    #[test]
    fn update_unknown_message_is_not_found() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.update_message("c1", &message("m1")),
            Err(StoreError::NotFound)
        ));
    }
}
