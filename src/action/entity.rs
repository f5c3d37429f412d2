//! Actions and their lifecycle
//!
//! An action is a unit of delegated work: it has a creator, a primary
//! assignee, an "in the loop" watcher list, a status and a priority.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::{ResolvedStream, StreamSelection};
use crate::error::{Field, ValidationError};
use crate::models::{ActorContext, User, UserId};

/// Status of an action
///
/// Any status may follow any other; `Completed` does not lock the action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "Pending",
            ActionStatus::InProgress => "InProgress",
            ActionStatus::Completed => "Completed",
        }
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ActionStatus::Pending),
            "InProgress" => Ok(ActionStatus::InProgress),
            "Completed" => Ok(ActionStatus::Completed),
            _ => Err(format!("Invalid action status: {}", s)),
        }
    }
}

/// Priority level, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Trivial = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Trivial => "Trivial",
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Trivial" => Ok(Priority::Trivial),
            "Low" => Ok(Priority::Low),
            "Medium" => Ok(Priority::Medium),
            "High" => Ok(Priority::High),
            "Critical" => Ok(Priority::Critical),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Opaque reference to an uploaded attachment blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentRef(pub String);

/// A persisted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub workspace: String,
    pub title: String,
    pub description: String,
    pub creator: UserId,
    pub creator_name: String,
    pub creator_role: String,
    /// Primary owner; `None` only for actions stored without one
    pub assignee: Option<UserId>,
    pub assignee_name: Option<String>,
    /// The loop: ordered, no duplicates
    pub sub_assigned: Vec<UserId>,
    pub stream: String,
    pub sub_streams: Vec<String>,
    pub status: ActionStatus,
    pub priority: Priority,
    pub expected_completion_date: NaiveDate,
    pub created_date: DateTime<Utc>,
    pub attachments: Vec<AttachmentRef>,
}

impl Action {
    pub fn has_assignee(&self) -> bool {
        self.assignee.is_some()
    }

    pub fn is_assignee(&self, user_id: &str) -> bool {
        self.assignee.as_deref() == Some(user_id)
    }

    pub fn is_creator(&self, user_id: &str) -> bool {
        self.creator == user_id
    }

    pub fn in_loop(&self, user_id: &str) -> bool {
        self.sub_assigned.iter().any(|id| id == user_id)
    }

    /// Whether the user shows up anywhere on the action
    pub fn involves(&self, user_id: &str) -> bool {
        self.is_creator(user_id) || self.is_assignee(user_id) || self.in_loop(user_id)
    }

    /// The stream selection this action was created under
    pub fn selection(&self) -> StreamSelection {
        StreamSelection {
            stream: Some(self.stream.clone()),
            sub_streams: self.sub_streams.clone(),
        }
    }
}

/// An action that has not been persisted yet
///
/// Drafts have no id, so assignment on a draft never needs confirmation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stream: StreamSelection,
    #[serde(default)]
    pub assignee: Option<User>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub expected_completion_date: Option<NaiveDate>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    /// Posted as the first root comment once the action exists
    #[serde(default)]
    pub initial_comment: Option<String>,
}

impl ActionDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn in_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream.stream = Some(stream.into());
        self
    }

    pub fn in_sub_streams(mut self, sub_streams: Vec<String>) -> Self {
        self.stream.sub_streams = sub_streams;
        self
    }

    pub fn assigned_to(mut self, user: User) -> Self {
        self.set_assignee(user);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.expected_completion_date = Some(date);
        self
    }

    pub fn with_attachment(mut self, attachment: AttachmentRef) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_initial_comment(mut self, text: impl Into<String>) -> Self {
        self.initial_comment = Some(text.into());
        self
    }

    /// Assign directly; there is nothing persisted to confirm against
    pub fn set_assignee(&mut self, user: User) {
        self.assignee = Some(user);
    }

    /// Check required fields in order and stop at the first missing one
    pub fn validate(&self, actor: &ActorContext) -> Result<NewAction, ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField(Field::Title));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingField(Field::Description));
        }
        if !actor.has_workspace() {
            return Err(ValidationError::MissingField(Field::Workspace));
        }
        let assignee = self
            .assignee
            .clone()
            .filter(|user| !user.id.trim().is_empty())
            .ok_or(ValidationError::MissingField(Field::Assignee))?;
        let priority = self
            .priority
            .ok_or(ValidationError::MissingField(Field::Priority))?;
        let expected_completion_date = self
            .expected_completion_date
            .ok_or(ValidationError::MissingField(Field::ExpectedCompletionDate))?;
        let ResolvedStream {
            stream,
            sub_streams,
        } = self
            .stream
            .resolve()
            .ok_or(ValidationError::MissingField(Field::Stream))?;

        Ok(NewAction {
            workspace: actor.workspace.clone(),
            title: self.title.trim().to_string(),
            description: self.description.clone(),
            creator: actor.as_user(),
            assignee,
            stream,
            sub_streams,
            priority,
            expected_completion_date,
            attachments: self.attachments.clone(),
        })
    }
}

/// A validated draft, ready for `ActionStore::create_action`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAction {
    pub workspace: String,
    pub title: String,
    pub description: String,
    pub creator: User,
    pub assignee: User,
    pub stream: String,
    pub sub_streams: Vec<String>,
    pub priority: Priority,
    pub expected_completion_date: NaiveDate,
    pub attachments: Vec<AttachmentRef>,
}

impl NewAction {
    pub fn selection(&self) -> StreamSelection {
        StreamSelection {
            stream: Some(self.stream.clone()),
            sub_streams: self.sub_streams.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PERSONAL_STREAM;

    fn actor() -> ActorContext {
        ActorContext::new("u1", "Ana Gomez", "member", "acme")
    }

    fn complete_draft() -> ActionDraft {
        ActionDraft::new("Renew SSL cert", "rotate before expiry")
            .in_stream(PERSONAL_STREAM)
            .assigned_to(actor().as_user())
            .with_priority(Priority::Critical)
            .due(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap())
    }

    #[test]
    fn test_action_status_as_str() {
        assert_eq!(ActionStatus::Pending.as_str(), "Pending");
        assert_eq!(ActionStatus::InProgress.as_str(), "InProgress");
        assert_eq!(ActionStatus::Completed.as_str(), "Completed");
    }

    #[test]
    fn test_action_status_from_str() {
        assert_eq!(
            "InProgress".parse::<ActionStatus>().unwrap(),
            ActionStatus::InProgress
        );
        assert!("in_progress".parse::<ActionStatus>().is_err());
    }

    #[test]
    fn test_action_status_default_is_pending() {
        assert_eq!(ActionStatus::default(), ActionStatus::Pending);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Trivial < Priority::Low);
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("Critical".parse::<Priority>().unwrap(), Priority::Critical);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_validate_complete_draft() {
        let new_action = complete_draft().validate(&actor()).unwrap();
        assert_eq!(new_action.title, "Renew SSL cert");
        assert_eq!(new_action.workspace, "acme");
        assert_eq!(new_action.stream, PERSONAL_STREAM);
        assert_eq!(new_action.creator.id, "u1");
        assert_eq!(new_action.assignee.id, "u1");
        assert_eq!(new_action.priority, Priority::Critical);
    }

    #[test]
    fn test_validate_defaults_to_personal_stream() {
        let mut draft = complete_draft();
        draft.stream = StreamSelection::default();
        let new_action = draft.validate(&actor()).unwrap();
        assert_eq!(new_action.stream, PERSONAL_STREAM);
        assert!(new_action.sub_streams.is_empty());
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        // Everything missing: title is reported, nothing else
        let draft = ActionDraft::default();
        assert_eq!(
            draft.validate(&actor()),
            Err(ValidationError::MissingField(Field::Title))
        );

        let draft = ActionDraft::new("Title", "   ");
        assert_eq!(
            draft.validate(&actor()),
            Err(ValidationError::MissingField(Field::Description))
        );

        let mut no_workspace = actor();
        no_workspace.workspace.clear();
        assert_eq!(
            complete_draft().validate(&no_workspace),
            Err(ValidationError::MissingField(Field::Workspace))
        );

        let mut draft = complete_draft();
        draft.assignee = None;
        assert_eq!(
            draft.validate(&actor()),
            Err(ValidationError::MissingField(Field::Assignee))
        );

        let mut draft = complete_draft();
        draft.priority = None;
        assert_eq!(
            draft.validate(&actor()),
            Err(ValidationError::MissingField(Field::Priority))
        );

        let mut draft = complete_draft();
        draft.expected_completion_date = None;
        assert_eq!(
            draft.validate(&actor()),
            Err(ValidationError::MissingField(Field::ExpectedCompletionDate))
        );
    }

    #[test]
    fn test_validate_unresolved_stream() {
        let mut draft = complete_draft();
        draft.stream = StreamSelection {
            stream: None,
            sub_streams: vec!["Night shift".to_string()],
        };
        assert_eq!(
            draft.validate(&actor()),
            Err(ValidationError::MissingField(Field::Stream))
        );
    }

    #[test]
    fn test_set_assignee_on_draft() {
        let mut draft = ActionDraft::new("t", "d");
        draft.set_assignee(actor().as_user());
        draft.set_assignee(User {
            id: "u2".to_string(),
            name: "Ben Gomez".to_string(),
            role: "member".to_string(),
        });
        assert_eq!(draft.assignee.unwrap().id, "u2");
    }

    #[test]
    fn test_action_involvement() {
        let action = Action {
            id: Uuid::new_v4(),
            workspace: "acme".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            creator: "u1".to_string(),
            creator_name: "Ana".to_string(),
            creator_role: "member".to_string(),
            assignee: Some("u2".to_string()),
            assignee_name: Some("Ben".to_string()),
            sub_assigned: vec!["u3".to_string()],
            stream: PERSONAL_STREAM.to_string(),
            sub_streams: vec![],
            status: ActionStatus::Pending,
            priority: Priority::Low,
            expected_completion_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            created_date: Utc::now(),
            attachments: vec![],
        };

        assert!(action.is_creator("u1"));
        assert!(action.is_assignee("u2"));
        assert!(action.in_loop("u3"));
        assert!(action.involves("u3"));
        assert!(!action.involves("u4"));
    }

    #[test]
    fn test_action_draft_serialization() {
        let json = serde_json::to_value(complete_draft()).unwrap();
        assert_eq!(json["priority"], "Critical");
        assert_eq!(json["expected_completion_date"], "2025-12-01");
    }
}
