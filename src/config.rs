//! Server configuration from flags and environment

use clap::Parser;
use std::net::SocketAddr;

use crate::action::history::MAX_PAGE_SIZE;

#[derive(Parser, Debug, Clone)]
#[command(name = "opsdesk")]
#[command(about = "Action delegation and notification server")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "OPSDESK_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:opsdesk.db?mode=rwc")]
    pub database_url: String,

    #[arg(long, env = "OPSDESK_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// History page size used when a request does not name one
    #[arg(
        long,
        env = "OPSDESK_HISTORY_PAGE_SIZE",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_PAGE_SIZE))
    )]
    pub history_page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: "sqlite:opsdesk.db?mode=rwc".to_string(),
            max_connections: 5,
            history_page_size: 10,
        }
    }
}
