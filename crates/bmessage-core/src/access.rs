//! Read, post and management gates.
//!
//! Roles are not stored. They are derived from set membership in a
//! [`Group`]: `creator ∈ admins ⊆ members`.

use bmessage_store::{Group, Message};

use crate::conversation::Conversation;

/// A user's standing in one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    NonMember,
    Member,
    Admin,
    Creator,
}

pub fn role_of(group: &Group, user_id: &str) -> Role {
    if group.is_creator(user_id) && group.is_member(user_id) {
        Role::Creator
    } else if group.is_admin(user_id) && group.is_member(user_id) {
        Role::Admin
    } else if group.is_member(user_id) {
        Role::Member
    } else {
        Role::NonMember
    }
}

pub fn can_read(conversation: &Conversation, user_id: &str) -> bool {
    match conversation {
        Conversation::Private(chat) => chat.has_participant(user_id),
        Conversation::Group(group) => group.is_member(user_id),
    }
}

/// Posting is gated exactly like reading.
pub fn can_post(conversation: &Conversation, user_id: &str) -> bool {
    can_read(conversation, user_id)
}

pub fn can_add_member(group: &Group, requester_id: &str) -> bool {
    match role_of(group, requester_id) {
        Role::Admin | Role::Creator => true,
        Role::Member => group.allow_members_to_add,
        Role::NonMember => false,
    }
}

/// Admin-only actions: removing members and changing settings.
pub fn can_manage(group: &Group, requester_id: &str) -> bool {
    role_of(group, requester_id) >= Role::Admin
}

/// Granting and revoking admin is reserved to the creator.
pub fn can_assign_admins(group: &Group, requester_id: &str) -> bool {
    group.is_creator(requester_id)
}

/// In a group any member may delete any message. In a private chat the
/// author or either participant may.
pub fn can_delete_message(conversation: &Conversation, message: &Message, requester_id: &str) -> bool {
    match conversation {
        Conversation::Group(group) => group.is_member(requester_id),
        Conversation::Private(chat) => {
            message.user_id == requester_id || chat.has_participant(requester_id)
        }
    }
}

/// Checks `creator ∈ admins ⊆ members` and that rosters hold no duplicates.
pub fn check_group_invariants(group: &Group) -> Result<(), String> {
    if !group.is_member(&group.creator) {
        return Err(format!("creator {} is not a member", group.creator));
    }
    if !group.is_admin(&group.creator) {
        return Err(format!("creator {} is not an admin", group.creator));
    }
    if let Some(stray) = group.admins.iter().find(|a| !group.is_member(a)) {
        return Err(format!("admin {stray} is not a member"));
    }
    for (label, list) in [("members", &group.members), ("admins", &group.admins)] {
        for (i, id) in list.iter().enumerate() {
            if list[..i].contains(id) {
                return Err(format!("duplicate {id} in {label}"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmessage_store::PrivateChat;
    use chrono::Utc;

    fn group() -> Group {
        Group {
            id: "g1".into(),
            name: "Team".into(),
            avatar: String::new(),
            creator: "owner".into(),
            admins: vec!["owner".into(), "admin".into()],
            members: vec!["owner".into(), "admin".into(), "member".into()],
            allow_members_to_add: false,
            invite_link: "inv".into(),
            messages: Vec::new(),
            created: Utc::now(),
        }
    }

    fn message(author: &str) -> Message {
        Message {
            id: "m1".into(),
            user_id: author.into(),
            text: "hi".into(),
            file: None,
            timestamp: Utc::now(),
            edited: None,
            deleted: false,
        }
    }

    #[test]
    fn roles_follow_set_membership() {
        let g = group();
        assert_eq!(role_of(&g, "owner"), Role::Creator);
        assert_eq!(role_of(&g, "admin"), Role::Admin);
        assert_eq!(role_of(&g, "member"), Role::Member);
        assert_eq!(role_of(&g, "stranger"), Role::NonMember);
    }

    #[test]
    fn add_member_policy() {
        let mut g = group();
        assert!(can_add_member(&g, "admin"));
        assert!(!can_add_member(&g, "member"));
        assert!(!can_add_member(&g, "stranger"));

        g.allow_members_to_add = true;
        assert!(can_add_member(&g, "member"));
        assert!(!can_add_member(&g, "stranger"));
    }

    #[test]
    fn only_creator_assigns_admins() {
        let g = group();
        assert!(can_assign_admins(&g, "owner"));
        assert!(!can_assign_admins(&g, "admin"));
        assert!(can_manage(&g, "admin"));
        assert!(!can_manage(&g, "member"));
    }

    #[test]
    fn private_delete_allows_either_participant() {
        let chat = Conversation::Private(PrivateChat {
            id: "c1".into(),
            participants: ["u1".into(), "u2".into()],
            messages: Vec::new(),
            created: Utc::now(),
        });
        let m = message("u1");
        assert!(can_delete_message(&chat, &m, "u1"));
        assert!(can_delete_message(&chat, &m, "u2"));
        assert!(!can_delete_message(&chat, &m, "u3"));
    }

    #[test]
    fn group_delete_requires_membership() {
        let conversation = Conversation::Group(group());
        let m = message("owner");
        assert!(can_delete_message(&conversation, &m, "member"));
        assert!(!can_delete_message(&conversation, &m, "stranger"));
    }

    #[test]
    fn invariant_violations_are_reported() {
        assert!(check_group_invariants(&group()).is_ok());

        let mut g = group();
        g.admins.retain(|a| a != "owner");
        assert!(check_group_invariants(&g).is_err());

        let mut g = group();
        g.admins.push("stranger".into());
        assert!(check_group_invariants(&g).is_err());

        let mut g = group();
        g.members.push("member".into());
        assert!(check_group_invariants(&g).is_err());
    }
}
