//! The Identity Directory: user records keyed by id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use bmessage_store::{Backend, User, UserSettings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{CoreError, Result};

/// Display fields copied onto a message when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

impl From<&User> for AuthorSnapshot {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

pub struct Directory {
    backend: Arc<dyn Backend>,
    users: RwLock<HashMap<String, User>>,
}

impl Directory {
    pub fn load(backend: Arc<dyn Backend>) -> Result<Self> {
        let users: HashMap<_, _> = backend
            .load_users()?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        info!(users = users.len(), "directory loaded");

        Ok(Self {
            backend,
            users: RwLock::new(users),
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .map_err(|_| CoreError::poisoned())?
            .get(id)
            .cloned())
    }

    pub fn require(&self, id: &str) -> Result<User> {
        self.get(id)?.ok_or_else(|| CoreError::not_found("User"))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.users.read().map_err(|_| CoreError::poisoned())?.len())
    }

    /// Record activity: provision if needed and set `last_seen` to `now`.
    pub fn touch(&self, id: &str, now: DateTime<Utc>) -> Result<User> {
        let mut users = self.write()?;
        let user = match users.get(id) {
            Some(existing) => User {
                last_seen: now,
                ..existing.clone()
            },
            None => {
                info!(user = %id, "user provisioned");
                User::provisioned(id, now)
            }
        };
        self.persist(&mut users, user.clone())?;
        Ok(user)
    }

    pub fn update_profile(&self, id: &str, update: ProfileUpdate) -> Result<User> {
        let mut users = self.write()?;
        let mut user = users
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("User"))?;

        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CoreError::validation("name must not be empty"));
            }
            user.name = name.to_string();
        }
        if let Some(avatar) = update.avatar {
            user.avatar = avatar;
        }

        self.persist(&mut users, user.clone())?;
        info!(user = %id, "profile updated");
        Ok(user)
    }

    /// Merge `patch` into the stored settings key by key and return the
    /// result. Keys absent from the patch keep their value.
    pub fn update_settings(&self, id: &str, patch: UserSettings) -> Result<UserSettings> {
        let mut users = self.write()?;
        let mut user = users
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("User"))?;

        user.settings.extend(patch);
        let settings = user.settings.clone();
        self.persist(&mut users, user)?;
        info!(user = %id, "settings updated");
        Ok(settings)
    }

    /// Case-insensitive substring match on name or id, sorted by name.
    pub fn search(&self, query: &str) -> Result<Vec<User>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let users = self.users.read().map_err(|_| CoreError::poisoned())?;
        let mut found: Vec<User> = users
            .values()
            .filter(|u| {
                u.name.to_lowercase().contains(&needle) || u.id.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    /// Current display fields for `id`. Unknown users get the id as name.
    pub fn snapshot(&self, id: &str) -> Result<AuthorSnapshot> {
        Ok(match self.get(id)? {
            Some(user) => AuthorSnapshot::from(&user),
            None => AuthorSnapshot {
                id: id.to_string(),
                name: id.to_string(),
                avatar: String::new(),
            },
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, User>>> {
        self.users.write().map_err(|_| CoreError::poisoned())
    }

    fn persist(&self, users: &mut HashMap<String, User>, user: User) -> Result<()> {
        self.backend.save_user(&user).map_err(|e| {
            error!(user = %user.id, error = %e, "failed to persist user");
            e
        })?;
        users.insert(user.id.clone(), user);
        Ok(())
    }
}
