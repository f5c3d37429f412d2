//! Who may do what on an action
//!
//! Access is derived from how the actor relates to the action rather than
//! stored: the creator and assignee own it, loop members may edit it, and
//! admins of the action's workspace pass every check. An actor from another
//! workspace is always an outsider.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::entity::Action;
use crate::error::{AppError, Result};
use crate::models::ActorContext;

/// Operations gated per action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Post comments and replies
    Comment,
    /// Upload attachments
    Upload,
    /// Change status or description
    Edit,
    /// Propose and confirm a new assignee
    Reassign,
    /// Add or remove loop members
    ManageLoop,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Comment => "comment",
            Capability::Upload => "upload",
            Capability::Edit => "edit",
            Capability::Reassign => "reassign",
            Capability::ManageLoop => "manage_loop",
        }
    }

    pub fn all() -> HashSet<Capability> {
        [
            Capability::Comment,
            Capability::Upload,
            Capability::Edit,
            Capability::Reassign,
            Capability::ManageLoop,
        ]
        .into_iter()
        .collect()
    }

    /// What a loop member gets: the editable areas, not ownership
    pub fn loop_member() -> HashSet<Capability> {
        [Capability::Comment, Capability::Upload, Capability::Edit]
            .into_iter()
            .collect()
    }
}

/// How an actor relates to an action, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Admin,
    Creator,
    Assignee,
    LoopMember,
    Outsider,
}

impl Relation {
    pub fn of(action: &Action, actor: &ActorContext) -> Self {
        if actor.workspace != action.workspace {
            Relation::Outsider
        } else if actor.is_admin() {
            Relation::Admin
        } else if action.is_creator(&actor.user_id) {
            Relation::Creator
        } else if action.is_assignee(&actor.user_id) {
            Relation::Assignee
        } else if action.in_loop(&actor.user_id) {
            Relation::LoopMember
        } else {
            Relation::Outsider
        }
    }

    pub fn capabilities(&self) -> HashSet<Capability> {
        match self {
            Relation::Admin | Relation::Creator | Relation::Assignee => Capability::all(),
            Relation::LoopMember => Capability::loop_member(),
            Relation::Outsider => HashSet::new(),
        }
    }
}

/// `creator ∨ assignee ∨ loop member` (or admin)
pub fn can_edit(action: &Action, actor: &ActorContext) -> bool {
    has(action, actor, Capability::Edit)
}

pub fn has(action: &Action, actor: &ActorContext, capability: Capability) -> bool {
    Relation::of(action, actor)
        .capabilities()
        .contains(&capability)
}

/// Fail with a user-visible denial unless the actor holds the capability
pub fn require(action: &Action, actor: &ActorContext, capability: Capability) -> Result<()> {
    if has(action, actor, capability) {
        Ok(())
    } else {
        Err(AppError::NotAuthorized(format!(
            "{} may not {} action {}",
            actor.user_id,
            capability.as_str(),
            action.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::entity::{ActionStatus, Priority};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn action() -> Action {
        Action {
            id: Uuid::new_v4(),
            workspace: "acme".to_string(),
            title: "Rotate keys".to_string(),
            description: "before Friday".to_string(),
            creator: "creator".to_string(),
            creator_name: "Cora".to_string(),
            creator_role: "manager".to_string(),
            assignee: Some("assignee".to_string()),
            assignee_name: Some("Abe".to_string()),
            sub_assigned: vec!["watcher".to_string()],
            stream: "Ops".to_string(),
            sub_streams: vec![],
            status: ActionStatus::Pending,
            priority: Priority::High,
            expected_completion_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            created_date: Utc::now(),
            attachments: vec![],
        }
    }

    fn actor(id: &str, role: &str) -> ActorContext {
        ActorContext::new(id, id, role, "acme")
    }

    #[test]
    fn test_relation_of() {
        let action = action();
        assert_eq!(Relation::of(&action, &actor("creator", "member")), Relation::Creator);
        assert_eq!(Relation::of(&action, &actor("assignee", "member")), Relation::Assignee);
        assert_eq!(Relation::of(&action, &actor("watcher", "member")), Relation::LoopMember);
        assert_eq!(Relation::of(&action, &actor("other", "member")), Relation::Outsider);
        assert_eq!(Relation::of(&action, &actor("other", "admin")), Relation::Admin);
    }

    #[test]
    fn test_other_workspace_is_outsider() {
        let action = action();
        for role in ["admin", "member"] {
            for id in ["creator", "assignee", "watcher", "other"] {
                let foreign = ActorContext::new(id, id, role, "globex");
                assert_eq!(Relation::of(&action, &foreign), Relation::Outsider);
                assert!(!has(&action, &foreign, Capability::Edit));
            }
        }
    }

    #[test]
    fn test_loop_member_can_edit_but_not_reassign() {
        let action = action();
        let watcher = actor("watcher", "member");
        assert!(can_edit(&action, &watcher));
        assert!(has(&action, &watcher, Capability::Comment));
        assert!(has(&action, &watcher, Capability::Upload));
        assert!(!has(&action, &watcher, Capability::Reassign));
        assert!(!has(&action, &watcher, Capability::ManageLoop));
    }

    #[test]
    fn test_outsider_cannot_edit() {
        let action = action();
        let result = require(&action, &actor("other", "member"), Capability::Comment);
        assert!(matches!(result, Err(AppError::NotAuthorized(_))));
    }

    #[test]
    fn test_owner_and_admin_have_everything() {
        let action = action();
        for who in [actor("creator", "member"), actor("assignee", "member"), actor("x", "admin")] {
            for cap in Capability::all() {
                assert!(has(&action, &who, cap), "{} should have {}", who.user_id, cap.as_str());
            }
        }
    }

    #[test]
    fn test_capability_serialization() {
        let json = serde_json::to_string(&Capability::ManageLoop).unwrap();
        assert_eq!(json, "\"manage_loop\"");
    }
}
