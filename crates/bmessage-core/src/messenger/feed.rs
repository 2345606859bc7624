use bmessage_store::{Comment, NotificationKind, Post, UserSettings};
use chrono::Utc;
use tracing::info;

use super::{LikeOutcome, Messenger, PostAuthor, PostView, Profile, PublicProfile, UserSummary};
use crate::error::Result;
use crate::feed;
use crate::new_id;
use crate::notify::Event;

impl Messenger {
    /// Every post, newest first, each decorated with the author's current
    /// display fields and settings.
    pub fn feed(&self) -> Result<Vec<PostView>> {
        self.feed
            .newest_first()?
            .into_iter()
            .map(|post| -> Result<PostView> {
                let user = self.directory.get(&post.user_id)?.as_ref().map(PostAuthor::from);
                Ok(PostView { post, user })
            })
            .collect()
    }

    pub fn create_post(&self, author_id: &str, text: String, image: String) -> Result<Post> {
        let post = feed::compose_post(new_id(), author_id, text, image, Utc::now())?;
        let post = self.feed.insert(post)?;
        info!(post = %post.id, user = %author_id, "post created");
        Ok(post)
    }

    pub fn edit_post(&self, post_id: &str, editor_id: &str, text: String) -> Result<Post> {
        let (post, ()) = self
            .feed
            .update(post_id, |p| feed::edit_post(p, editor_id, text, Utc::now()))?;
        info!(post = %post_id, user = %editor_id, "post edited");
        Ok(post)
    }

    pub fn delete_post(&self, post_id: &str, requester_id: &str) -> Result<()> {
        self.feed
            .remove(post_id, |p| feed::check_author(p, requester_id))?;
        info!(post = %post_id, user = %requester_id, "post deleted");
        Ok(())
    }

    /// Like or unlike. Only a new like notifies the author.
    pub fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<LikeOutcome> {
        let (post, liked) = self
            .feed
            .update(post_id, |p| Ok(feed::toggle_like(p, user_id)))?;
        if liked {
            self.notify_post_author(NotificationKind::Like, user_id, &post);
        }
        Ok(LikeOutcome {
            likes: post.likes.len(),
            liked,
        })
    }

    /// The comment carries the author's display fields as they are now.
    pub fn comment_on_post(&self, post_id: &str, author_id: &str, text: String) -> Result<Comment> {
        let author = self.directory.snapshot(author_id)?;
        let comment = feed::compose_comment(new_id(), &author, text, Utc::now())?;
        let post = self.feed.add_comment(post_id, comment.clone())?;
        info!(post = %post_id, user = %author_id, comment = %comment.id, "comment added");
        self.notify_post_author(NotificationKind::Comment, author_id, &post);
        Ok(comment)
    }

    /// The caller's own record, settings included, with their posts.
    pub fn profile(&self, user_id: &str) -> Result<Profile> {
        Ok(Profile {
            user: self.directory.require(user_id)?,
            posts: self.feed.by_author(user_id)?,
        })
    }

    /// Another user's public fields with their posts. Settings are omitted.
    pub fn public_profile(&self, user_id: &str) -> Result<PublicProfile> {
        let user = self.directory.require(user_id)?;
        Ok(PublicProfile {
            user: UserSummary::from(&user),
            posts: self.feed.by_author(user_id)?,
        })
    }

    pub fn update_settings(&self, user_id: &str, patch: UserSettings) -> Result<UserSettings> {
        self.directory.update_settings(user_id, patch)
    }

    fn notify_post_author(&self, kind: NotificationKind, actor_id: &str, post: &Post) {
        if actor_id == post.user_id {
            return;
        }
        let event = Event {
            kind,
            actor_id,
            conversation_id: None,
            message_id: None,
            post_id: Some(&post.id),
            at: Utc::now(),
        };
        self.sink().deliver(event.for_recipient(&post.user_id));
    }
}
