//! Shared data models: actors, users and the stream hierarchy

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Self-only stream used when no stream or sub-stream is chosen
pub const PERSONAL_STREAM: &str = "Personal_Stream";

/// Pool of workspace users that belong to no stream
pub const UNASSIGNED_USERS: &str = "unassigned_users";

/// Opaque user identifier supplied by the authentication layer
pub type UserId = String;

/// The authenticated caller of an engine operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: UserId,
    pub user_name: String,
    pub role: String,
    /// Empty when the session carries no workspace
    #[serde(default)]
    pub workspace: String,
}

impl ActorContext {
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        role: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            role: role.into(),
            workspace: workspace.into(),
        }
    }

    /// Admins pass every ownership check inside their own workspace
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }

    pub fn has_workspace(&self) -> bool {
        !self.workspace.trim().is_empty()
    }

    /// The actor as a selectable user
    pub fn as_user(&self) -> User {
        User {
            id: self.user_id.clone(),
            name: self.user_name.clone(),
            role: self.role.clone(),
        }
    }
}

/// A workspace member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: String,
}

/// A top-level organisational grouping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub id: Uuid,
    pub stream_title: String,
}

/// A grouping nested under a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubStream {
    pub id: Uuid,
    pub sub_stream_title: String,
    pub description: String,
    pub stream_title: String,
}

/// Which users a `list_users` call returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum UserScope {
    /// Every member of the workspace
    Workspace,
    /// Members of a stream
    Stream { stream: String },
    /// Members of any of the given sub-streams of a stream
    SubStreams {
        stream: String,
        sub_streams: Vec<String>,
    },
    /// Workspace users with no stream membership
    Unassigned,
}
