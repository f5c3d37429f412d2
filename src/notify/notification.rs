//! Notification records and push events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::Action;
use crate::models::{ActorContext, UserId};

/// Kind of notification, which decides how a client opens it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Assignment,
    CommentReply,
    SurveyLaunch,
}

impl Default for NotificationKind {
    fn default() -> Self {
        NotificationKind::Assignment
    }
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Assignment => "assignment",
            NotificationKind::CommentReply => "comment_reply",
            NotificationKind::SurveyLaunch => "survey_launch",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assignment" => Ok(NotificationKind::Assignment),
            "comment_reply" => Ok(NotificationKind::CommentReply),
            "survey_launch" => Ok(NotificationKind::SurveyLaunch),
            _ => Err(format!("Invalid notification kind: {}", s)),
        }
    }
}

/// What a notification points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSubject {
    Action(Uuid),
    Survey(Uuid),
}

/// A per-user notification with its own read state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub subject: NotificationSubject,
    /// Action title or message shown in the list
    pub title: String,
    pub created_by_name: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub notification_type: NotificationKind,
    pub created_at: DateTime<Utc>,
}

/// Where a client goes when a notification is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum NotificationRoute {
    OpenAction { action_id: Uuid },
    OpenSurvey { survey_id: Uuid },
    Toast { message: String },
}

impl Notification {
    pub fn route(&self) -> NotificationRoute {
        match (self.notification_type, self.subject) {
            (NotificationKind::CommentReply, _) => NotificationRoute::Toast {
                message: format!("{} replied: {}", self.created_by_name, self.title),
            },
            (_, NotificationSubject::Survey(survey_id)) => {
                NotificationRoute::OpenSurvey { survey_id }
            }
            (_, NotificationSubject::Action(action_id)) => {
                NotificationRoute::OpenAction { action_id }
            }
        }
    }
}

/// Named events on a user's real-time channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushEventName {
    #[serde(rename = "newAction")]
    NewAction,
    #[serde(rename = "newSubAssignedAction")]
    NewSubAssignedAction,
    #[serde(rename = "new_survey")]
    NewSurvey,
    #[serde(rename = "comment_reply")]
    CommentReply,
}

impl PushEventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushEventName::NewAction => "newAction",
            PushEventName::NewSubAssignedAction => "newSubAssignedAction",
            PushEventName::NewSurvey => "new_survey",
            PushEventName::CommentReply => "comment_reply",
        }
    }
}

/// A notification delivered over the real-time channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    pub event: PushEventName,
    pub notification: Notification,
}

/// Input for `ActionStore::notify_user`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    pub subject: NotificationSubject,
    pub title: String,
    pub created_by_name: String,
    pub notification_type: NotificationKind,
    /// Event name used when pushing; not persisted
    pub event: PushEventName,
}

impl NewNotification {
    /// The action was created for, or reassigned to, `recipient`
    pub fn assignment(action: &Action, recipient: &str, actor: &ActorContext) -> Self {
        Self {
            user_id: recipient.to_string(),
            subject: NotificationSubject::Action(action.id),
            title: action.title.clone(),
            created_by_name: actor.user_name.clone(),
            notification_type: NotificationKind::Assignment,
            event: PushEventName::NewAction,
        }
    }

    /// `recipient` was added to the action's loop
    pub fn loop_in(action: &Action, recipient: &str, actor: &ActorContext) -> Self {
        Self {
            event: PushEventName::NewSubAssignedAction,
            ..Self::assignment(action, recipient, actor)
        }
    }

    pub fn comment_reply(action: &Action, recipient: &str, actor: &ActorContext) -> Self {
        Self {
            user_id: recipient.to_string(),
            subject: NotificationSubject::Action(action.id),
            title: action.title.clone(),
            created_by_name: actor.user_name.clone(),
            notification_type: NotificationKind::CommentReply,
            event: PushEventName::CommentReply,
        }
    }

    pub fn survey_launch(
        survey_id: Uuid,
        title: impl Into<String>,
        recipient: &str,
        actor: &ActorContext,
    ) -> Self {
        Self {
            user_id: recipient.to_string(),
            subject: NotificationSubject::Survey(survey_id),
            title: title.into(),
            created_by_name: actor.user_name.clone(),
            notification_type: NotificationKind::SurveyLaunch,
            event: PushEventName::NewSurvey,
        }
    }
}
