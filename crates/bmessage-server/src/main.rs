//! # bmessage-server
//!
//! HTTP backend for BMessage.
//!
//! This binary provides:
//! - **REST API** (axum) for profiles, private chats, groups and
//!   notifications
//! - **Session verification** against the external issuer's Ed25519 key
//! - **Attachment storage** on local disk, served back under `/uploads`
//! - **Notification writer** that persists feed entries off the request path

mod api;
mod auth;
mod config;
mod error;
mod notifier;
mod upload_store;

use std::sync::Arc;

use bmessage_core::{Messenger, SessionKeyResolver};
use bmessage_store::{Backend, Database};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::notifier::ChannelSink;
use crate::upload_store::UploadStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,bmessage_server=debug,bmessage_core=debug")
            }),
        )
        .init();

    info!("Starting BMessage server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.session_key_missing() {
        warn!("SESSION_PUBKEY is not set; every authenticated request will be rejected");
    }

    // -----------------------------------------------------------------------
    // 3. Open storage
    // -----------------------------------------------------------------------
    let database = if config.database_in_memory() {
        warn!("Using an in-memory database; nothing survives a restart");
        Database::open_in_memory()?
    } else {
        Database::open_at(&config.database_path)?
    };
    let backend: Arc<dyn Backend> = Arc::new(database);

    let uploads = Arc::new(
        UploadStore::new(config.upload_path.clone(), config.max_upload_size).await?,
    );

    // -----------------------------------------------------------------------
    // 4. Load state and spawn the notification writer
    // -----------------------------------------------------------------------
    let (sink, _writer) = ChannelSink::spawn(backend.clone());
    let messenger = Messenger::open(
        backend,
        Arc::new(SessionKeyResolver::new(config.session_pubkey)),
        Arc::new(sink),
    )?;

    let stats = messenger.stats()?;
    info!(
        users = stats.users_count,
        chats = stats.chats_count,
        groups = stats.groups_count,
        posts = stats.posts_count,
        "Loaded conversation state"
    );

    let http_addr = config.http_addr;
    let app_state = AppState {
        messenger: Arc::new(messenger),
        uploads,
        config: Arc::new(config),
        started_at: chrono::Utc::now(),
    };

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
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
