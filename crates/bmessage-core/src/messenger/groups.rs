use bmessage_store::{Group, NotificationKind};
use chrono::Utc;
use tracing::info;

use super::{rejected, GroupDetails, MemberInfo, Messenger};
use crate::access::can_manage;
use crate::error::{CoreError, Result};
use crate::membership::{self, GroupDraft, GroupSettingsPatch};
use crate::notify::Event;
use crate::store::lock;

impl Messenger {
    /// Create a group owned by `creator_id`.
    pub fn create_group(&self, creator_id: &str, draft: GroupDraft) -> Result<Group> {
        let handle = self.conversations.create_group(creator_id, draft, Utc::now())?;
        let conversation = lock(&handle)?;
        conversation
            .as_group()
            .cloned()
            .ok_or_else(|| CoreError::Internal("group index holds a private chat".to_string()))
    }

    /// The group plus display info for each member. Members only.
    pub fn group_details(&self, group_id: &str, user_id: &str) -> Result<GroupDetails> {
        let handle = self.conversations.group(group_id)?;
        let group = {
            let conversation = lock(&handle)?;
            match conversation.as_group() {
                Some(group) if group.is_member(user_id) => group.clone(),
                Some(_) => {
                    return Err(rejected(group_id, user_id)(CoreError::forbidden(
                        "not a member of this group",
                    )))
                }
                None => return Err(CoreError::not_found("Group")),
            }
        };

        let mut members_info = Vec::with_capacity(group.members.len());
        for member_id in &group.members {
            let snapshot = self.directory.snapshot(member_id)?;
            members_info.push(MemberInfo {
                id: snapshot.id,
                name: snapshot.name,
                avatar: snapshot.avatar,
                is_admin: group.is_admin(member_id),
                is_creator: group.is_creator(member_id),
            });
        }
        Ok(GroupDetails {
            group,
            members_info,
        })
    }

    /// Fails unless `user_id` is an admin of the group.
    pub fn check_manage_access(&self, group_id: &str, user_id: &str) -> Result<()> {
        let handle = self.conversations.group(group_id)?;
        let conversation = lock(&handle)?;
        match conversation.as_group() {
            Some(group) if can_manage(group, user_id) => Ok(()),
            Some(_) => Err(rejected(group_id, user_id)(CoreError::forbidden(
                "only admins can change the group",
            ))),
            None => Err(CoreError::not_found("Group")),
        }
    }

    pub fn update_group_settings(
        &self,
        group_id: &str,
        requester_id: &str,
        patch: GroupSettingsPatch,
    ) -> Result<Group> {
        let handle = self.conversations.group(group_id)?;
        let (group, changed) = self
            .conversations
            .update_group(&handle, |g| membership::apply_settings(g, requester_id, patch))
            .map_err(rejected(group_id, requester_id))?;
        if changed {
            info!(group = %group_id, user = %requester_id, "group settings updated");
        }
        Ok(group)
    }

    /// Returns `true` if `user_id` was not already a member.
    pub fn add_member(&self, group_id: &str, requester_id: &str, user_id: &str) -> Result<bool> {
        let handle = self.conversations.group(group_id)?;
        let (_, added) = self
            .conversations
            .update_group(&handle, |g| membership::add_member(g, user_id, requester_id))
            .map_err(rejected(group_id, requester_id))?;
        if added {
            info!(group = %group_id, user = %requester_id, member = %user_id, "member added");
            self.notify_one(NotificationKind::GroupAdded, requester_id, group_id, user_id);
        }
        Ok(added)
    }

    /// Returns `true` if `target_id` was a member.
    pub fn remove_member(&self, group_id: &str, requester_id: &str, target_id: &str) -> Result<bool> {
        let handle = self.conversations.group(group_id)?;
        let (_, removed) = self
            .conversations
            .update_group(&handle, |g| membership::remove_member(g, target_id, requester_id))
            .map_err(rejected(group_id, requester_id))?;
        if removed {
            info!(group = %group_id, user = %requester_id, member = %target_id, "member removed");
            self.notify_one(NotificationKind::GroupRemoved, requester_id, group_id, target_id);
        }
        Ok(removed)
    }

    pub fn promote_to_admin(&self, group_id: &str, requester_id: &str, target_id: &str) -> Result<bool> {
        let handle = self.conversations.group(group_id)?;
        let (_, promoted) = self
            .conversations
            .update_group(&handle, |g| membership::promote_to_admin(g, target_id, requester_id))
            .map_err(rejected(group_id, requester_id))?;
        if promoted {
            info!(group = %group_id, member = %target_id, "admin granted");
            self.notify_one(NotificationKind::AdminGranted, requester_id, group_id, target_id);
        }
        Ok(promoted)
    }

    pub fn demote_admin(&self, group_id: &str, requester_id: &str, target_id: &str) -> Result<bool> {
        let handle = self.conversations.group(group_id)?;
        let (_, demoted) = self
            .conversations
            .update_group(&handle, |g| membership::demote_admin(g, target_id, requester_id))
            .map_err(rejected(group_id, requester_id))?;
        if demoted {
            info!(group = %group_id, member = %target_id, "admin revoked");
            self.notify_one(NotificationKind::AdminRevoked, requester_id, group_id, target_id);
        }
        Ok(demoted)
    }

    /// Join through an invite link. Joining twice is a no-op.
    pub fn join_by_invite_link(&self, token: &str, user_id: &str) -> Result<Group> {
        let handle = self.conversations.group_by_invite(token)?;
        let (group, joined) = self
            .conversations
            .update_group(&handle, |g| Ok(membership::join(g, user_id)))?;
        if joined {
            info!(group = %group.id, user = %user_id, "joined by invite link");
        }
        Ok(group)
    }

    fn notify_one(&self, kind: NotificationKind, actor_id: &str, group_id: &str, recipient_id: &str) {
        if actor_id == recipient_id {
            return;
        }
        let event = Event {
            kind,
            actor_id,
            conversation_id: Some(group_id),
            message_id: None,
            post_id: None,
            at: Utc::now(),
        };
        self.sink().deliver(event.for_recipient(recipient_id));
    }
}
