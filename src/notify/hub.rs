//! Per-user real-time notification channels
//!
//! Every user id gets its own broadcast channel, created on first join.
//! All open sessions of the same user subscribe to the same channel, so each
//! of them sees every push in emission order.

use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use super::notification::PushEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Fan-out point for push notifications
pub struct NotificationHub {
    channels: RwLock<HashMap<String, broadcast::Sender<PushEvent>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe a session to a user's channel
    pub async fn join(&self, user_id: &str) -> broadcast::Receiver<PushEvent> {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        tracing::debug!(user_id, sessions = sender.receiver_count() + 1, "Session joined");
        sender.subscribe()
    }

    /// Push an event to every open session of the user
    ///
    /// Returns how many sessions received it. Zero is normal: the
    /// notification is already stored and will be picked up by the next fetch.
    pub async fn publish(&self, user_id: &str, event: PushEvent) -> usize {
        let channels = self.channels.read().await;
        match channels.get(user_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Drop channels nobody listens to any more
    pub async fn prune(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        before - channels.len()
    }

    pub async fn session_count(&self, user_id: &str) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(user_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}
