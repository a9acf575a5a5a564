//! # murmur-server
//!
//! Real-time backend for the murmur chat app.
//!
//! This binary provides:
//! - **Live channel** over websocket: presence (`online-users`), direct and
//!   group message delivery, and the notification feed
//! - **Notification pipeline** that persists every notification before it is
//!   pushed, so a live push never describes unsaved state
//! - **REST API** (axum) for registration, friends, groups, message history
//!   and notification management
//! - **SQLite storage** via `murmur-store`

mod api;
mod auth;
mod config;
mod error;
mod friends;
mod groups;
mod locks;
mod messaging;
mod notifications;
mod pipeline;
mod presence;
mod router;
mod session;
mod state;
mod ws;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use murmur_store::{Database, SqliteStore};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,murmur_server=debug")),
        )
        .init();

    info!("Starting murmur server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store (creates the file and runs migrations)
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;
    info!(path = %config.database_path.display(), "Database ready");
    let store = Arc::new(SqliteStore::new(db));

    let http_addr = config.http_addr;
    let app_state = AppState::new(config, store);

    // -----------------------------------------------------------------------
    // 4. Run the HTTP + websocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
