//! The Conversation Store.
//!
//! Private chats and groups share one id space. Each conversation sits behind
//! its own mutex so unrelated conversations never contend; the id indexes sit
//! behind `RwLock`s and are only held long enough to clone a handle.
//!
//! Writes go to the backend first and are applied in memory only once the
//! backend accepted them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use bmessage_shared::generate_invite_link;
use bmessage_store::{Backend, Group, Message, PrivateChat};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::access::{can_read, check_group_invariants};
use crate::conversation::Conversation;
use crate::error::{CoreError, Result};
use crate::membership::{self, GroupDraft};
use crate::new_id;

pub type ConversationHandle = Arc<Mutex<Conversation>>;

#[derive(Default)]
struct ChatIndex {
    by_id: HashMap<String, ConversationHandle>,
    by_pair: HashMap<(String, String), String>,
}

#[derive(Default)]
struct GroupIndex {
    by_id: HashMap<String, ConversationHandle>,
    by_invite: HashMap<String, String>,
}

pub struct ConversationStore {
    backend: Arc<dyn Backend>,
    chats: RwLock<ChatIndex>,
    groups: RwLock<GroupIndex>,
}

/// Lock a single conversation.
pub fn lock(handle: &ConversationHandle) -> Result<MutexGuard<'_, Conversation>> {
    handle.lock().map_err(|_| CoreError::poisoned())
}

impl ConversationStore {
    /// Load every conversation from `backend` and build the indexes.
    pub fn load(backend: Arc<dyn Backend>) -> Result<Self> {
        let mut chats = ChatIndex::default();
        for chat in backend.load_private_chats()? {
            let [a, b] = &chat.participants;
            chats
                .by_pair
                .insert(PrivateChat::pair_key(a, b), chat.id.clone());
            chats
                .by_id
                .insert(chat.id.clone(), Arc::new(Mutex::new(Conversation::Private(chat))));
        }

        let mut groups = GroupIndex::default();
        for group in backend.load_groups()? {
            groups
                .by_invite
                .insert(group.invite_link.clone(), group.id.clone());
            groups
                .by_id
                .insert(group.id.clone(), Arc::new(Mutex::new(Conversation::Group(group))));
        }

        info!(
            chats = chats.by_id.len(),
            groups = groups.by_id.len(),
            "conversation store loaded"
        );

        Ok(Self {
            backend,
            chats: RwLock::new(chats),
            groups: RwLock::new(groups),
        })
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Find a conversation by id, probing private chats before groups.
    pub fn resolve(&self, id: &str) -> Result<ConversationHandle> {
        if let Some(handle) = self.read_chats()?.by_id.get(id) {
            return Ok(Arc::clone(handle));
        }
        self.read_groups()?
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Conversation"))
    }

    pub fn group(&self, id: &str) -> Result<ConversationHandle> {
        self.read_groups()?
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Group"))
    }

    pub fn group_by_invite(&self, token: &str) -> Result<ConversationHandle> {
        let groups = self.read_groups()?;
        groups
            .by_invite
            .get(token)
            .and_then(|id| groups.by_id.get(id))
            .cloned()
            .ok_or_else(|| CoreError::not_found("Invite link"))
    }

    /// Return the chat between `user_a` and `user_b`, creating it if needed.
    /// The flag is `true` when a new chat was created.
    pub fn find_or_create_private_chat(
        &self,
        user_a: &str,
        user_b: &str,
        now: DateTime<Utc>,
    ) -> Result<(ConversationHandle, bool)> {
        if user_a == user_b {
            return Err(CoreError::validation(
                "a private chat needs two distinct participants",
            ));
        }

        let key = PrivateChat::pair_key(user_a, user_b);
        let mut chats = self.chats.write().map_err(|_| CoreError::poisoned())?;

        if let Some(handle) = chats.by_pair.get(&key).and_then(|id| chats.by_id.get(id)) {
            return Ok((Arc::clone(handle), false));
        }

        let chat = PrivateChat {
            id: new_id(),
            participants: [user_a.to_string(), user_b.to_string()],
            messages: Vec::new(),
            created: now,
        };
        self.backend.save_private_chat(&chat).map_err(|e| {
            error!(error = %e, "failed to persist private chat");
            e
        })?;

        info!(chat = %chat.id, a = %user_a, b = %user_b, "private chat created");

        let id = chat.id.clone();
        let handle = Arc::new(Mutex::new(Conversation::Private(chat)));
        chats.by_pair.insert(key, id.clone());
        chats.by_id.insert(id, Arc::clone(&handle));
        Ok((handle, true))
    }

    /// Create a group with a fresh invite link that no other group uses.
    pub fn create_group(
        &self,
        creator_id: &str,
        draft: GroupDraft,
        now: DateTime<Utc>,
    ) -> Result<ConversationHandle> {
        let mut groups = self.groups.write().map_err(|_| CoreError::poisoned())?;

        let mut invite_link = generate_invite_link();
        while groups.by_invite.contains_key(&invite_link) {
            debug!("invite link collision, regenerating");
            invite_link = generate_invite_link();
        }

        let group = membership::new_group(new_id(), creator_id, draft, invite_link, now)?;
        self.backend.save_group(&group).map_err(|e| {
            error!(error = %e, "failed to persist group");
            e
        })?;

        info!(group = %group.id, creator = %creator_id, members = group.members.len(), "group created");

        let id = group.id.clone();
        groups
            .by_invite
            .insert(group.invite_link.clone(), id.clone());
        let handle = Arc::new(Mutex::new(Conversation::Group(group)));
        groups.by_id.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Apply `mutate` to a copy of the group's metadata, persist it if it
    /// changed, then commit. Returns the resulting group and the change flag.
    pub fn update_group<F>(&self, handle: &ConversationHandle, mutate: F) -> Result<(Group, bool)>
    where
        F: FnOnce(&mut Group) -> Result<bool>,
    {
        let mut conversation = lock(handle)?;
        let group = conversation
            .as_group_mut()
            .ok_or_else(|| CoreError::not_found("Group"))?;

        let mut draft = membership::metadata_of(group);
        let changed = mutate(&mut draft)?;

        if changed {
            check_group_invariants(&draft).map_err(CoreError::Internal)?;
            self.backend.save_group(&draft).map_err(|e| {
                error!(group = %draft.id, error = %e, "failed to persist group");
                e
            })?;
            draft.messages = std::mem::take(&mut group.messages);
            *group = draft;
        }

        Ok((group.clone(), changed))
    }

    pub fn append_message(&self, conversation: &mut Conversation, message: Message) -> Result<()> {
        self.backend
            .insert_message(conversation.id(), &message)
            .map_err(|e| {
                error!(conversation = %conversation.id(), error = %e, "failed to persist message");
                e
            })?;
        conversation.messages_mut().push(message);
        Ok(())
    }

    /// Overwrite a stored message in place.
    pub fn replace_message(&self, conversation: &mut Conversation, message: Message) -> Result<()> {
        let position = conversation
            .message_position(&message.id)
            .ok_or_else(|| CoreError::not_found("Message"))?;
        self.backend
            .update_message(conversation.id(), &message)
            .map_err(|e| {
                error!(conversation = %conversation.id(), error = %e, "failed to persist message update");
                e
            })?;
        conversation.messages_mut()[position] = message;
        Ok(())
    }

    pub fn remove_message(&self, conversation: &mut Conversation, message_id: &str) -> Result<()> {
        let position = conversation
            .message_position(message_id)
            .ok_or_else(|| CoreError::not_found("Message"))?;
        self.backend
            .remove_message(conversation.id(), message_id)
            .map_err(|e| {
                error!(conversation = %conversation.id(), error = %e, "failed to persist message removal");
                e
            })?;
        conversation.messages_mut().remove(position);
        Ok(())
    }

    /// Snapshots of every conversation `user_id` can read.
    pub fn conversations_of(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let mut handles: Vec<ConversationHandle> =
            self.read_chats()?.by_id.values().cloned().collect();
        handles.extend(self.read_groups()?.by_id.values().cloned());

        let mut visible = Vec::new();
        for handle in &handles {
            let conversation = lock(handle)?;
            if can_read(&conversation, user_id) {
                visible.push(conversation.clone());
            }
        }
        Ok(visible)
    }

    /// Number of private chats and groups.
    pub fn counts(&self) -> Result<(usize, usize)> {
        Ok((self.read_chats()?.by_id.len(), self.read_groups()?.by_id.len()))
    }

    fn read_chats(&self) -> Result<std::sync::RwLockReadGuard<'_, ChatIndex>> {
        self.chats.read().map_err(|_| CoreError::poisoned())
    }

    fn read_groups(&self) -> Result<std::sync::RwLockReadGuard<'_, GroupIndex>> {
        self.groups.read().map_err(|_| CoreError::poisoned())
    }
}
