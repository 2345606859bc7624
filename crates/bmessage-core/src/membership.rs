//! Group membership and role transitions.
//!
//! Every function checks authorization before touching the group, so a
//! rejected call leaves it exactly as it was. Mutators return `true` when
//! the group changed and `false` for an accepted no-op.

use bmessage_store::Group;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::access::{can_add_member, can_assign_admins, can_manage};
use crate::error::{CoreError, Result};

/// Parameters for a new group.
#[derive(Debug, Clone, Default)]
pub struct GroupDraft {
    pub name: String,
    pub avatar: String,
    pub member_ids: Vec<String>,
    pub allow_members_to_add: bool,
}

/// Settings an admin may change. Unset fields are left alone and an empty
/// name is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettingsPatch {
    pub name: Option<String>,
    pub allow_members_to_add: Option<bool>,
    pub avatar: Option<String>,
}

/// Build a group owned by `creator_id`. The creator is the first member and
/// the only admin; the remaining member ids are deduplicated in order.
pub fn new_group(
    id: String,
    creator_id: &str,
    draft: GroupDraft,
    invite_link: String,
    now: DateTime<Utc>,
) -> Result<Group> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(CoreError::validation("group name is required"));
    }

    let mut members = vec![creator_id.to_string()];
    for member in draft.member_ids {
        if !member.is_empty() && !members.contains(&member) {
            members.push(member);
        }
    }

    Ok(Group {
        id,
        name: name.to_string(),
        avatar: draft.avatar,
        creator: creator_id.to_string(),
        admins: vec![creator_id.to_string()],
        members,
        allow_members_to_add: draft.allow_members_to_add,
        invite_link,
        messages: Vec::new(),
        created: now,
    })
}

pub fn add_member(group: &mut Group, user_id: &str, requester_id: &str) -> Result<bool> {
    if !can_add_member(group, requester_id) {
        return Err(CoreError::forbidden("not allowed to add members"));
    }
    if user_id.trim().is_empty() {
        return Err(CoreError::validation("user id is required"));
    }
    if group.is_member(user_id) {
        return Ok(false);
    }
    group.members.push(user_id.to_string());
    Ok(true)
}

pub fn remove_member(group: &mut Group, target_id: &str, requester_id: &str) -> Result<bool> {
    if !can_manage(group, requester_id) {
        return Err(CoreError::forbidden("only admins can remove members"));
    }
    if group.is_creator(target_id) {
        return Err(CoreError::forbidden("the group creator cannot be removed"));
    }
    let before = group.members.len();
    group.members.retain(|m| m != target_id);
    group.admins.retain(|a| a != target_id);
    Ok(group.members.len() != before)
}

pub fn promote_to_admin(group: &mut Group, target_id: &str, requester_id: &str) -> Result<bool> {
    if !can_assign_admins(group, requester_id) {
        return Err(CoreError::forbidden("only the creator can grant admin"));
    }
    if group.is_admin(target_id) || !group.is_member(target_id) {
        return Ok(false);
    }
    group.admins.push(target_id.to_string());
    Ok(true)
}

pub fn demote_admin(group: &mut Group, target_id: &str, requester_id: &str) -> Result<bool> {
    if !can_assign_admins(group, requester_id) {
        return Err(CoreError::forbidden("only the creator can revoke admin"));
    }
    if group.is_creator(target_id) {
        return Err(CoreError::forbidden("the group creator cannot be demoted"));
    }
    let before = group.admins.len();
    group.admins.retain(|a| a != target_id);
    Ok(group.admins.len() != before)
}

/// Self-enrollment through the invite link. Idempotent.
pub fn join(group: &mut Group, user_id: &str) -> bool {
    if group.is_member(user_id) {
        return false;
    }
    group.members.push(user_id.to_string());
    true
}

pub fn apply_settings(group: &mut Group, requester_id: &str, patch: GroupSettingsPatch) -> Result<bool> {
    if !can_manage(group, requester_id) {
        return Err(CoreError::forbidden("only admins can change the group"));
    }

    let mut changed = false;
    if let Some(name) = patch.name {
        let name = name.trim();
        if !name.is_empty() && name != group.name {
            group.name = name.to_string();
            changed = true;
        }
    }
    if let Some(allow) = patch.allow_members_to_add {
        if allow != group.allow_members_to_add {
            group.allow_members_to_add = allow;
            changed = true;
        }
    }
    if let Some(avatar) = patch.avatar {
        if avatar != group.avatar {
            group.avatar = avatar;
            changed = true;
        }
    }
    Ok(changed)
}

/// Copy of everything but the message list.
pub(crate) fn metadata_of(group: &Group) -> Group {
    Group {
        id: group.id.clone(),
        name: group.name.clone(),
        avatar: group.avatar.clone(),
        creator: group.creator.clone(),
        admins: group.admins.clone(),
        members: group.members.clone(),
        allow_members_to_add: group.allow_members_to_add,
        invite_link: group.invite_link.clone(),
        messages: Vec::new(),
        created: group.created,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::check_group_invariants;

    fn group() -> Group {
        new_group(
            "g1".into(),
            "u1",
            GroupDraft {
                name: "Team".into(),
                member_ids: vec!["u2".into(), "u1".into(), "u2".into(), "u3".into()],
                ..Default::default()
            },
            "link".into(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn new_group_dedupes_and_seeds_roles() {
        let g = group();
        assert_eq!(g.members, ["u1", "u2", "u3"]);
        assert_eq!(g.admins, ["u1"]);
        assert_eq!(g.creator, "u1");
        check_group_invariants(&g).unwrap();
    }

    #[test]
    fn new_group_requires_name() {
        let draft = GroupDraft {
            name: "   ".into(),
            ..Default::default()
        };
        let result = new_group("g1".into(), "u1", draft, "link".into(), Utc::now());
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn add_member_is_idempotent() {
        let mut g = group();
        assert!(add_member(&mut g, "u4", "u1").unwrap());
        assert!(!add_member(&mut g, "u4", "u1").unwrap());
        assert_eq!(g.members.iter().filter(|m| *m == "u4").count(), 1);
    }

    #[test]
    fn add_member_rejects_empty_id() {
        let mut g = group();
        let before = g.clone();
        for id in ["", "  "] {
            assert!(matches!(
                add_member(&mut g, id, "u1"),
                Err(CoreError::Validation(_))
            ));
        }
        assert_eq!(g, before);
    }

    #[test]
    fn rejected_calls_leave_group_untouched() {
        let mut g = group();
        let before = g.clone();

        assert!(add_member(&mut g, "u4", "u2").is_err());
        assert!(remove_member(&mut g, "u3", "u2").is_err());
        assert!(promote_to_admin(&mut g, "u3", "u2").is_err());
        assert!(apply_settings(&mut g, "u2", GroupSettingsPatch::default()).is_err());

        assert_eq!(g, before);
    }

    #[test]
    fn creator_is_permanent() {
        let mut g = group();
        promote_to_admin(&mut g, "u2", "u1").unwrap();

        for requester in ["u1", "u2", "u3"] {
            assert!(matches!(
                remove_member(&mut g, "u1", requester),
                Err(CoreError::Forbidden(_))
            ));
            assert!(matches!(
                demote_admin(&mut g, "u1", requester),
                Err(CoreError::Forbidden(_))
            ));
        }
        check_group_invariants(&g).unwrap();
    }

    #[test]
    fn removal_clears_admin_role() {
        let mut g = group();
        promote_to_admin(&mut g, "u2", "u1").unwrap();
        assert!(remove_member(&mut g, "u2", "u1").unwrap());
        assert!(!g.is_member("u2"));
        assert!(!g.is_admin("u2"));
        check_group_invariants(&g).unwrap();
    }

    #[test]
    fn promote_non_member_is_noop() {
        let mut g = group();
        assert!(!promote_to_admin(&mut g, "stranger", "u1").unwrap());
        assert!(!g.is_admin("stranger"));
    }

    #[test]
    fn settings_patch_ignores_empty_name() {
        let mut g = group();
        let changed = apply_settings(
            &mut g,
            "u1",
            GroupSettingsPatch {
                name: Some(String::new()),
                allow_members_to_add: Some(true),
                avatar: None,
            },
        )
        .unwrap();
        assert!(changed);
        assert_eq!(g.name, "Team");
        assert!(g.allow_members_to_add);
    }
}
