//! WebSocket client for the opsdesk server

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use uuid::Uuid;

use opsdesk::action::{
    Action, ActionDraft, AppliedReassignment, CreatedAction, HistoryPage, ReassignOutcome,
    ThreadNode,
};
use opsdesk::error::ErrorKind;
use opsdesk::models::{ActorContext, User};
use opsdesk::notify::Notification;
use opsdesk::websocket::{ClientMessage, ServerMessage};

/// A refusal reported by the server
#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ServerError {
    pub kind: ErrorKind,
    pub message: String,
}

pub struct OpsClient {
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<ServerMessage>,
    /// Unsolicited messages that arrived while waiting for a reply
    backlog: VecDeque<ServerMessage>,
    #[allow(dead_code)]
    handle: tokio::task::JoinHandle<()>,
}

impl OpsClient {
    /// Connect and join as `actor`
    pub async fn connect(url: &str, actor: &ActorContext) -> Result<Self> {
        tracing::info!("Connecting to {}", url);

        let (ws_stream, _) = connect_async(url).await?;
        let (mut write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<Message>(32);
        let (in_tx, in_rx) = mpsc::channel::<ServerMessage>(32);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(msg) = out_rx.recv() => {
                        if write.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Some(result) = read.next() => {
                        match result {
                            Ok(Message::Text(text)) => {
                                match serde_json::from_str::<ServerMessage>(&text) {
                                    Ok(msg) => {
                                        if in_tx.send(msg).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        tracing::warn!("Failed to parse message: {} - {}", e, text);
                                    }
                                }
                            }
                            Ok(Message::Close(_)) => break,
                            Err(e) => {
                                tracing::error!("WebSocket error: {}", e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    else => break,
                }
            }
        });

        let mut client = Self {
            tx: out_tx,
            rx: in_rx,
            backlog: VecDeque::new(),
            handle,
        };

        client
            .request(
                ClientMessage::Join {
                    user_id: actor.user_id.clone(),
                    user_name: actor.user_name.clone(),
                    role: actor.role.clone(),
                    workspace: actor.workspace.clone(),
                },
                |msg| match msg {
                    ServerMessage::Joined { user_id } => Ok(user_id),
                    other => Err(other),
                },
            )
            .await?;
        tracing::info!(user_id = %actor.user_id, "Joined");

        Ok(client)
    }

    async fn send(&self, msg: ClientMessage) -> Result<()> {
        let json = serde_json::to_string(&msg)?;
        self.tx
            .send(Message::Text(json))
            .await
            .map_err(|e| anyhow!("Failed to send message: {}", e))
    }

    /// Next message, unsolicited ones first
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        match self.backlog.pop_front() {
            Some(msg) => Some(msg),
            None => self.rx.recv().await,
        }
    }

    /// Send `msg` and wait for the reply `pick` accepts
    ///
    /// Pushes and change events seen meanwhile are kept for `recv`.
    async fn request<T, F>(&mut self, msg: ClientMessage, mut pick: F) -> Result<T>
    where
        F: FnMut(ServerMessage) -> std::result::Result<T, ServerMessage>,
    {
        self.send(msg).await?;

        while let Some(msg) = self.rx.recv().await {
            if let ServerMessage::Error { kind, message } = msg {
                return Err(ServerError { kind, message }.into());
            }
            match pick(msg) {
                Ok(value) => return Ok(value),
                Err(other) => self.backlog.push_back(other),
            }
        }

        Err(anyhow!("Connection closed"))
    }

    pub async fn create_action(&mut self, draft: ActionDraft) -> Result<CreatedAction> {
        self.request(ClientMessage::CreateAction { draft }, |msg| match msg {
            ServerMessage::ActionCreated { created } => Ok(created),
            other => Err(other),
        })
        .await
    }

    pub async fn list_actions(&mut self) -> Result<Vec<Action>> {
        self.request(ClientMessage::ListActions, |msg| match msg {
            ServerMessage::Actions { actions } => Ok(actions),
            other => Err(other),
        })
        .await
    }

    pub async fn propose_reassignment(
        &mut self,
        action_id: Uuid,
        assignee: User,
    ) -> Result<ReassignOutcome> {
        self.request(
            ClientMessage::ProposeReassignment {
                action_id,
                assignee,
            },
            |msg| match msg {
                ServerMessage::Reassignment { outcome } => Ok(outcome),
                other => Err(other),
            },
        )
        .await
    }

    pub async fn confirm_reassignment(
        &mut self,
        proposal_id: Uuid,
    ) -> Result<AppliedReassignment> {
        self.request(ClientMessage::ConfirmReassignment { proposal_id }, |msg| match msg {
            ServerMessage::Reassignment {
                outcome: ReassignOutcome::Applied(applied),
            } => Ok(applied),
            other => Err(other),
        })
        .await
    }

    pub async fn thread(&mut self, action_id: Uuid) -> Result<Vec<ThreadNode>> {
        self.request(ClientMessage::GetThread { action_id }, |msg| match msg {
            ServerMessage::Thread { thread, .. } => Ok(thread),
            other => Err(other),
        })
        .await
    }

    pub async fn history(&mut self, action_id: Uuid, page: u32) -> Result<HistoryPage> {
        self.request(
            ClientMessage::GetHistory {
                action_id,
                page: Some(page),
                page_size: None,
            },
            |msg| match msg {
                ServerMessage::History { history, .. } => Ok(history),
                other => Err(other),
            },
        )
        .await
    }

    pub async fn workspace_members(&mut self) -> Result<Vec<User>> {
        self.request(ClientMessage::WorkspaceMembers, |msg| match msg {
            ServerMessage::Users { users } => Ok(users),
            other => Err(other),
        })
        .await
    }

    pub async fn notifications(&mut self) -> Result<Vec<Notification>> {
        self.request(ClientMessage::GetNotifications, |msg| match msg {
            ServerMessage::Notifications { notifications } => Ok(notifications),
            other => Err(other),
        })
        .await
    }

    pub async fn mark_all_read(&mut self, through: DateTime<Utc>) -> Result<u64> {
        self.request(ClientMessage::MarkAllRead { through }, |msg| match msg {
            ServerMessage::MarkedRead { marked, .. } => Ok(marked),
            other => Err(other),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_serialization() {
        let msg = ClientMessage::Join {
            user_id: "u1".to_string(),
            user_name: "Ana Gomez".to_string(),
            role: "member".to_string(),
            workspace: "acme".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"join\""));
        assert!(json.contains("Ana Gomez"));
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError {
            kind: ErrorKind::Authorization,
            message: "Only u1 can decide reassignment".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Authorization: Only u1 can decide reassignment"
        );
    }
}
