//! WebSocket session: join, engine requests, and real-time forwarding
//!
//! The first message of a session must be `join`. After that the session
//! receives the user's pushes and change events for its workspace while it
//! keeps serving requests.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::action::{
    Action, ActionDraft, ActionEvent, ActionStatus, Comment, CreatedAction, DeletionProposal,
    Delivery, HistoryPage, ReassignOutcome, ReassignmentProposal, ThreadNode,
};
use crate::directory::StreamSelection;
use crate::error::{AppError, ErrorKind, Result};
use crate::models::{ActorContext, Stream, SubStream, User, UserId};
use crate::notify::{Notification, PushEventName};
use crate::AppState;

/// WebSocket handler
pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type Sender = SplitSink<WebSocket, Message>;

async fn send(sender: &mut Sender, msg: &ServerMessage) -> bool {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Failed to encode message: {}", e);
            return true;
        }
    };
    match sender.send(Message::Text(text)).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Failed to send message: {}", e);
            false
        }
    }
}

async fn next_message(receiver: &mut SplitStream<WebSocket>) -> Option<String> {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                return None;
            }
        }
    }
    None
}

fn parse(text: &str) -> std::result::Result<ClientMessage, ServerMessage> {
    serde_json::from_str(text).map_err(|e| ServerMessage::Error {
        kind: ErrorKind::Validation,
        message: format!("Invalid message: {}", e),
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let actor = loop {
        let Some(text) = next_message(&mut receiver).await else {
            return;
        };
        let reply = match parse(&text) {
            Ok(ClientMessage::Join {
                user_id,
                user_name,
                role,
                workspace,
            }) if !user_id.trim().is_empty() => {
                break ActorContext::new(user_id, user_name, role, workspace);
            }
            Ok(ClientMessage::Join { .. }) => ServerMessage::Error {
                kind: ErrorKind::Validation,
                message: "user_id is required".to_string(),
            },
            Ok(_) => ServerMessage::Error {
                kind: ErrorKind::Authorization,
                message: "Join before sending requests".to_string(),
            },
            Err(error) => error,
        };
        if !send(&mut sender, &reply).await {
            return;
        }
    };

    let mut pushes = state.hub.join(&actor.user_id).await;
    let mut changes = state.engine.subscribe();
    tracing::info!(user_id = %actor.user_id, workspace = %actor.workspace, "Session joined");

    if !send(
        &mut sender,
        &ServerMessage::Joined {
            user_id: actor.user_id.clone(),
        },
    )
    .await
    {
        return;
    }

    loop {
        tokio::select! {
            text = next_message(&mut receiver) => {
                let Some(text) = text else { break };
                let reply = match parse(&text) {
                    Ok(msg) => dispatch(&state, &actor, msg).await.unwrap_or_else(|e| {
                        match e.kind() {
                            ErrorKind::Transient => tracing::error!(user_id = %actor.user_id, "Request failed: {}", e),
                            _ => tracing::debug!(user_id = %actor.user_id, "Request rejected: {}", e),
                        }
                        ServerMessage::Error { kind: e.kind(), message: e.to_string() }
                    }),
                    Err(error) => error,
                };
                if !send(&mut sender, &reply).await {
                    break;
                }
            }
            push = pushes.recv() => match push {
                Ok(push) => {
                    let msg = ServerMessage::Push {
                        event: push.event,
                        notification: push.notification,
                    };
                    if !send(&mut sender, &msg).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %actor.user_id, skipped, "Push channel lagged");
                }
                Err(RecvError::Closed) => break,
            },
            change = changes.recv() => match change {
                Ok(event) if event.workspace() == actor.workspace => {
                    if !send(&mut sender, &ServerMessage::ActionChanged { event }).await {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %actor.user_id, skipped, "Change feed lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    drop(pushes);
    state.hub.prune().await;
    tracing::info!(user_id = %actor.user_id, "Session closed");
}

async fn dispatch(
    state: &AppState,
    actor: &ActorContext,
    msg: ClientMessage,
) -> Result<ServerMessage> {
    let engine = &state.engine;

    let reply = match msg {
        ClientMessage::Join { .. } => {
            return Err(AppError::Conflict("Session already joined".to_string()))
        }
        ClientMessage::CreateAction { draft } => ServerMessage::ActionCreated {
            created: engine.create_action(draft, actor).await?,
        },
        ClientMessage::GetAction { action_id } => ServerMessage::Action {
            action: engine.get_action(action_id, actor).await?,
        },
        ClientMessage::ListActions => ServerMessage::Actions {
            actions: engine.list_actions(actor).await?,
        },
        ClientMessage::UpdateStatus { action_id, status } => ServerMessage::Action {
            action: engine.update_status(action_id, status, actor).await?,
        },
        ClientMessage::UpdateDescription {
            action_id,
            description,
        } => ServerMessage::Action {
            action: engine
                .update_description(action_id, &description, actor)
                .await?,
        },
        ClientMessage::ProposeReassignment {
            action_id,
            assignee,
        } => ServerMessage::Reassignment {
            outcome: engine
                .propose_reassignment(action_id, assignee, actor)
                .await?,
        },
        ClientMessage::ConfirmReassignment { proposal_id } => ServerMessage::Reassignment {
            outcome: ReassignOutcome::Applied(
                engine.confirm_reassignment(proposal_id, actor).await?,
            ),
        },
        ClientMessage::CancelReassignment { proposal_id } => {
            ServerMessage::ReassignmentCancelled {
                proposal: engine.cancel_reassignment(proposal_id, actor).await?,
            }
        }
        ClientMessage::AddToLoop { action_id, user_id } => ServerMessage::Action {
            action: engine
                .add_to_loop(action_id, user_id.as_deref(), actor)
                .await?,
        },
        ClientMessage::RemoveFromLoop { action_id, user_id } => ServerMessage::Action {
            action: engine.remove_from_loop(action_id, &user_id, actor).await?,
        },
        ClientMessage::PostComment { action_id, text } => ServerMessage::Comment {
            comment: engine.post_comment(action_id, &text, actor).await?,
        },
        ClientMessage::PostReply { comment_id, text } => ServerMessage::Comment {
            comment: engine.post_reply(comment_id, &text, actor).await?,
        },
        ClientMessage::RequestCommentDeletion { comment_id } => {
            ServerMessage::DeletionProposed {
                proposal: engine.request_comment_deletion(comment_id, actor).await?,
            }
        }
        ClientMessage::ConfirmCommentDeletion { proposal_id } => {
            ServerMessage::CommentsDeleted {
                comment_ids: engine.confirm_comment_deletion(proposal_id, actor).await?,
            }
        }
        ClientMessage::CancelCommentDeletion { proposal_id } => {
            ServerMessage::DeletionCancelled {
                proposal: engine.cancel_comment_deletion(proposal_id, actor).await?,
            }
        }
        ClientMessage::GetThread { action_id } => ServerMessage::Thread {
            action_id,
            thread: engine.comment_thread(action_id, actor).await?,
        },
        ClientMessage::GetHistory {
            action_id,
            page,
            page_size,
        } => ServerMessage::History {
            action_id,
            history: engine
                .history(
                    action_id,
                    page.unwrap_or(1),
                    page_size.unwrap_or(state.config.history_page_size),
                    actor,
                )
                .await?,
        },
        ClientMessage::ListStreams => ServerMessage::Streams {
            streams: engine.directory().streams(actor).await?,
        },
        ClientMessage::ListSubStreams { stream } => ServerMessage::SubStreams {
            sub_streams: engine.directory().sub_streams(actor, &stream).await?,
        },
        ClientMessage::EligibleAssignees { selection } => ServerMessage::Users {
            users: engine
                .directory()
                .eligible_assignees(actor, &selection)
                .await?,
        },
        ClientMessage::WorkspaceMembers => ServerMessage::Users {
            users: engine.directory().workspace_members(actor).await?,
        },
        ClientMessage::GetNotifications => ServerMessage::Notifications {
            notifications: engine.notifications(actor).await?,
        },
        ClientMessage::MarkAllRead { through } => ServerMessage::MarkedRead {
            through,
            marked: engine.mark_all_read(actor, through).await?,
        },
        ClientMessage::DeleteNotification { notification_id } => {
            engine.delete_notification(notification_id, actor).await?;
            ServerMessage::NotificationDeleted { notification_id }
        }
        ClientMessage::AnnounceSurvey {
            survey_id,
            title,
            recipients,
        } => ServerMessage::SurveyAnnounced {
            survey_id,
            deliveries: engine
                .announce_survey(survey_id, &title, &recipients, actor)
                .await?,
        },
    };

    Ok(reply)
}

/// Messages from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Identify the session; must come first
    Join {
        user_id: UserId,
        user_name: String,
        role: String,
        #[serde(default)]
        workspace: String,
    },
    CreateAction {
        draft: ActionDraft,
    },
    GetAction {
        action_id: Uuid,
    },
    ListActions,
    UpdateStatus {
        action_id: Uuid,
        status: ActionStatus,
    },
    UpdateDescription {
        action_id: Uuid,
        description: String,
    },
    ProposeReassignment {
        action_id: Uuid,
        assignee: User,
    },
    ConfirmReassignment {
        proposal_id: Uuid,
    },
    CancelReassignment {
        proposal_id: Uuid,
    },
    AddToLoop {
        action_id: Uuid,
        #[serde(default)]
        user_id: Option<UserId>,
    },
    RemoveFromLoop {
        action_id: Uuid,
        user_id: UserId,
    },
    PostComment {
        action_id: Uuid,
        text: String,
    },
    PostReply {
        comment_id: Uuid,
        text: String,
    },
    RequestCommentDeletion {
        comment_id: Uuid,
    },
    ConfirmCommentDeletion {
        proposal_id: Uuid,
    },
    CancelCommentDeletion {
        proposal_id: Uuid,
    },
    GetThread {
        action_id: Uuid,
    },
    GetHistory {
        action_id: Uuid,
        #[serde(default)]
        page: Option<u32>,
        #[serde(default)]
        page_size: Option<u32>,
    },
    ListStreams,
    ListSubStreams {
        stream: String,
    },
    EligibleAssignees {
        selection: StreamSelection,
    },
    WorkspaceMembers,
    GetNotifications,
    /// Mark read everything created at or before `through`
    MarkAllRead {
        through: DateTime<Utc>,
    },
    DeleteNotification {
        notification_id: Uuid,
    },
    AnnounceSurvey {
        survey_id: Uuid,
        title: String,
        recipients: Vec<UserId>,
    },
}

/// Messages from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined {
        user_id: UserId,
    },
    /// Real-time notification for the joined user
    Push {
        event: PushEventName,
        notification: Notification,
    },
    /// Something changed on an action in the session's workspace
    ActionChanged {
        event: ActionEvent,
    },
    ActionCreated {
        created: CreatedAction,
    },
    Action {
        action: Action,
    },
    Actions {
        actions: Vec<Action>,
    },
    Reassignment {
        outcome: ReassignOutcome,
    },
    ReassignmentCancelled {
        proposal: ReassignmentProposal,
    },
    /// `None` when blank text was ignored
    Comment {
        comment: Option<Comment>,
    },
    DeletionProposed {
        proposal: DeletionProposal,
    },
    CommentsDeleted {
        comment_ids: Vec<Uuid>,
    },
    DeletionCancelled {
        proposal: DeletionProposal,
    },
    Thread {
        action_id: Uuid,
        thread: Vec<ThreadNode>,
    },
    History {
        action_id: Uuid,
        history: HistoryPage,
    },
    Streams {
        streams: Vec<Stream>,
    },
    SubStreams {
        sub_streams: Vec<SubStream>,
    },
    Users {
        users: Vec<User>,
    },
    Notifications {
        notifications: Vec<Notification>,
    },
    MarkedRead {
        through: DateTime<Utc>,
        marked: u64,
    },
    NotificationDeleted {
        notification_id: Uuid,
    },
    SurveyAnnounced {
        survey_id: Uuid,
        deliveries: Vec<Delivery>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}
