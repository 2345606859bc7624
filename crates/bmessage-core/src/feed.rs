//! The public post feed: posts, likes and comments.
//!
//! Posts live in one list in creation order behind a `RwLock`. As with
//! conversations, every change is written to the backend before it is
//! applied in memory.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bmessage_store::{Backend, Comment, Post};
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::directory::AuthorSnapshot;
use crate::error::{CoreError, Result};

/// A post needs text or an image.
pub fn compose_post(
    id: String,
    author_id: &str,
    text: String,
    image: String,
    now: DateTime<Utc>,
) -> Result<Post> {
    if text.trim().is_empty() && image.is_empty() {
        return Err(CoreError::validation("post text or image is required"));
    }
    Ok(Post {
        id,
        user_id: author_id.to_string(),
        text,
        image,
        timestamp: now,
        edited: None,
        likes: Vec::new(),
        comments: Vec::new(),
    })
}

pub fn check_author(post: &Post, user_id: &str) -> Result<()> {
    if post.user_id == user_id {
        Ok(())
    } else {
        Err(CoreError::forbidden("only the author can change a post"))
    }
}

/// Author-only. Empty text leaves the current text in place but still
/// marks the post as edited.
pub fn edit_post(post: &mut Post, editor_id: &str, text: String, now: DateTime<Utc>) -> Result<()> {
    check_author(post, editor_id)?;
    if !text.trim().is_empty() {
        post.text = text;
    }
    post.edited = Some(now);
    Ok(())
}

/// Like or unlike. Returns `true` if the post is now liked by `user_id`.
pub fn toggle_like(post: &mut Post, user_id: &str) -> bool {
    match post.likes.iter().position(|l| l == user_id) {
        Some(index) => {
            post.likes.remove(index);
            false
        }
        None => {
            post.likes.push(user_id.to_string());
            true
        }
    }
}

/// The author's display fields are frozen into the comment.
pub fn compose_comment(
    id: String,
    author: &AuthorSnapshot,
    text: String,
    now: DateTime<Utc>,
) -> Result<Comment> {
    if text.trim().is_empty() {
        return Err(CoreError::validation("comment text is required"));
    }
    Ok(Comment {
        id,
        user_id: author.id.clone(),
        user_name: author.name.clone(),
        user_avatar: author.avatar.clone(),
        text,
        timestamp: now,
    })
}

pub struct Feed {
    backend: Arc<dyn Backend>,
    posts: RwLock<Vec<Post>>,
}

impl Feed {
    pub fn load(backend: Arc<dyn Backend>) -> Result<Self> {
        let posts = backend.load_posts()?;
        info!(posts = posts.len(), "feed loaded");
        Ok(Self {
            backend,
            posts: RwLock::new(posts),
        })
    }

    /// Every post, newest first. Equal timestamps keep the later post first.
    pub fn newest_first(&self) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.read()?.iter().rev().cloned().collect();
        posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(posts)
    }

    pub fn by_author(&self, user_id: &str) -> Result<Vec<Post>> {
        Ok(self
            .newest_first()?
            .into_iter()
            .filter(|p| p.user_id == user_id)
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn insert(&self, post: Post) -> Result<Post> {
        let mut posts = self.write()?;
        self.backend.save_post(&post).map_err(|e| {
            error!(post = %post.id, error = %e, "failed to persist post");
            e
        })?;
        posts.push(post.clone());
        Ok(post)
    }

    /// Apply `mutate` to a copy of the post, persist it, then commit.
    pub fn update<F, T>(&self, post_id: &str, mutate: F) -> Result<(Post, T)>
    where
        F: FnOnce(&mut Post) -> Result<T>,
    {
        let mut posts = self.write()?;
        let stored = posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| CoreError::not_found("Post"))?;

        let mut draft = stored.clone();
        let outcome = mutate(&mut draft)?;
        self.backend.save_post(&draft).map_err(|e| {
            error!(post = %post_id, error = %e, "failed to persist post");
            e
        })?;
        *stored = draft.clone();
        Ok((draft, outcome))
    }

    /// Remove the post once `allowed` accepts it.
    pub fn remove<F>(&self, post_id: &str, allowed: F) -> Result<()>
    where
        F: FnOnce(&Post) -> Result<()>,
    {
        let mut posts = self.write()?;
        let index = posts
            .iter()
            .position(|p| p.id == post_id)
            .ok_or_else(|| CoreError::not_found("Post"))?;

        allowed(&posts[index])?;
        self.backend.remove_post(post_id).map_err(|e| {
            error!(post = %post_id, error = %e, "failed to persist post removal");
            e
        })?;
        posts.remove(index);
        Ok(())
    }

    /// Append a comment and return the post it was added to.
    pub fn add_comment(&self, post_id: &str, comment: Comment) -> Result<Post> {
        let mut posts = self.write()?;
        let stored = posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| CoreError::not_found("Post"))?;

        self.backend.insert_comment(post_id, &comment).map_err(|e| {
            error!(post = %post_id, error = %e, "failed to persist comment");
            e
        })?;
        stored.comments.push(comment);
        Ok(stored.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Post>>> {
        self.posts.read().map_err(|_| CoreError::poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Post>>> {
        self.posts.write().map_err(|_| CoreError::poisoned())
    }
}
