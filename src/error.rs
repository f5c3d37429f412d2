//! Error types for the application

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A required or constrained field on an action operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Description,
    Workspace,
    Assignee,
    Priority,
    ExpectedCompletionDate,
    Stream,
    LoopMember,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Workspace => "workspace",
            Field::Assignee => "assignee",
            Field::Priority => "priority",
            Field::ExpectedCompletionDate => "expected_completion_date",
            Field::Stream => "stream",
            Field::LoopMember => "loop_member",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-specific validation failures, reported before any store call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(Field),

    #[error("user {user_id} is not selectable for stream {stream}")]
    AssigneeNotEligible { user_id: String, stream: String },
}

impl ValidationError {
    pub fn field(&self) -> Field {
        match self {
            ValidationError::MissingField(field) => *field,
            ValidationError::AssigneeNotEligible { .. } => Field::Assignee,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// How a failure is surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Inline, field-specific; nothing was sent to the store
    Validation,
    /// User-visible denial
    Authorization,
    /// Precondition not met, no retry
    Conflict,
    NotFound,
    /// Network or server failure, shown as a toast, never retried
    Transient,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => ErrorKind::Validation,
            AppError::NotAuthorized(_) => ErrorKind::Authorization,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Database(_) | AppError::Migrate(_) | AppError::Internal(_) => {
                ErrorKind::Transient
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Migrate(e) => {
                tracing::error!("Migration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::NotAuthorized(e) => (StatusCode::FORBIDDEN, e.clone()),
            AppError::Conflict(e) => (StatusCode::CONFLICT, e.clone()),
            AppError::NotFound(e) => (StatusCode::NOT_FOUND, e.clone()),
            AppError::BadRequest(e) => (StatusCode::BAD_REQUEST, e.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.clone())
            }
        };

        (status, message).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
