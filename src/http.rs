//! Read-only HTTP surface
//!
//! Callers identify themselves with the `x-opsdesk-user` and
//! `x-opsdesk-workspace` headers, as the authentication proxy in front of the
//! server sets them. `x-opsdesk-role` is optional and defaults to member.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::action::HistoryPage;
use crate::error::{AppError, Result};
use crate::models::ActorContext;
use crate::notify::Notification;
use crate::{websocket, AppState};

pub const USER_HEADER: &str = "x-opsdesk-user";
pub const WORKSPACE_HEADER: &str = "x-opsdesk-workspace";
pub const ROLE_HEADER: &str = "x-opsdesk-role";

/// All routes, without middleware layers
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket::handler))
        .route("/api/actions/:id/history", get(action_history))
        .route("/api/users/:user_id/notifications", get(user_notifications))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The caller named by the identity headers
pub fn caller(headers: &HeaderMap) -> Result<ActorContext> {
    let (Some(user_id), Some(workspace)) =
        (header(headers, USER_HEADER), header(headers, WORKSPACE_HEADER))
    else {
        return Err(AppError::NotAuthorized(format!(
            "{} and {} headers are required",
            USER_HEADER, WORKSPACE_HEADER
        )));
    };
    let role = header(headers, ROLE_HEADER).unwrap_or("member");
    Ok(ActorContext::new(user_id, user_id, role, workspace))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

async fn action_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>> {
    let actor = caller(&headers)?;
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(state.config.history_page_size);
    let history = state.engine.history(id, page, page_size, &actor).await?;
    Ok(Json(history))
}

async fn user_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Notification>>> {
    let actor = caller(&headers)?;
    if actor.user_id != user_id {
        return Err(AppError::NotAuthorized(format!(
            "{} may not read notifications of {}",
            actor.user_id, user_id
        )));
    }
    let notifications = state.engine.notifications(&actor).await?;
    Ok(Json(notifications))
}
