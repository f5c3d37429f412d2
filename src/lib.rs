//! opsdesk: action delegation and notification engine

pub mod action;
pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod models;
pub mod notify;
pub mod store;
pub mod websocket;

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::action::ActionEngine;
use crate::config::ServerConfig;
use crate::notify::NotificationHub;
use crate::store::Store;

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<Store>,
    pub engine: Arc<ActionEngine>,
    pub hub: Arc<NotificationHub>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: ServerConfig) -> Arc<Self> {
        let hub = Arc::new(NotificationHub::new());
        let store = Arc::new(Store::with_hub(pool, hub.clone()));
        let engine = Arc::new(ActionEngine::new(store.clone()));
        Arc::new(Self {
            store,
            engine,
            hub,
            config,
        })
    }
}
