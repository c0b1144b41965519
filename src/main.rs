//! Wordplay document server
//!
//! Hosts the per-user level documents the game syncs against:
//! - Sled embedded database for document persistence
//! - Axum HTTP routes for reads and whole-document writes
//! - WebSocket subscriptions for live updates

use anyhow::Context;
use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use wordplay::server;
use wordplay::storage::SledDocumentStore;
use wordplay::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wordplay=info,wordplay_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env().context("Invalid configuration")?;

    // ========================================================================
    // STORAGE
    // ========================================================================

    info!("Initializing storage at: {}", config.storage.path);
    let db = config.storage.open().context("Failed to open storage")?;
    let documents = SledDocumentStore::open(&db).context("Failed to open document tree")?;
    info!("Storage initialized with {} documents", documents.count());

    // ========================================================================
    // ROUTER
    // ========================================================================

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    let app = server::router(documents)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!("Wordplay server v{} starting", env!("CARGO_PKG_VERSION"));
    info!("   Listening on: http://{}", config.bind);
    info!("   Documents: http://{}/documents/*path", config.bind);
    info!("   Subscriptions: ws://{}/subscribe/*path", config.bind);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    axum::serve(listener, app).await.context("Server error")?;

    db.flush().context("Failed to flush storage")?;
    Ok(())
}
