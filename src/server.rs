//! HTTP/WebSocket document service.
//!
//! Routes:
//! - `GET /health`
//! - `GET /documents/*path`, `PUT /documents/*path`
//! - `GET /subscribe/*path` (WebSocket, one JSON text frame per version)

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::remote::{codes, Document, DocumentPath, DocumentStore, DocumentWrite, StoreError};
use crate::storage::SledDocumentStore;

/// Shared server state
pub struct ServerState {
    documents: SledDocumentStore,
    started_at: Instant,
}

impl ServerState {
    pub fn new(documents: SledDocumentStore) -> Self {
        Self {
            documents,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    documents: usize,
    watched_paths: usize,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Store errors rendered as HTTP responses
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.code.as_str() {
            codes::INVALID_ARGUMENT => StatusCode::BAD_REQUEST,
            codes::UNAUTHENTICATED => StatusCode::UNAUTHORIZED,
            codes::PERMISSION_DENIED => StatusCode::FORBIDDEN,
            codes::NOT_FOUND => StatusCode::NOT_FOUND,
            codes::RESOURCE_EXHAUSTED => StatusCode::TOO_MANY_REQUESTS,
            codes::UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            code: self.0.code,
            message: self.0.message,
        };
        (status, Json(body)).into_response()
    }
}

/// Router over `documents`; middleware is added by the caller
pub fn router(documents: SledDocumentStore) -> Router {
    let state = Arc::new(ServerState::new(documents));

    Router::new()
        .route("/health", get(health_check))
        .route("/documents/*path", get(get_document).put(put_document))
        .route("/subscribe/*path", get(subscribe_handler))
        .with_state(state)
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        documents: state.documents.count(),
        watched_paths: state.documents.watched_paths(),
    })
}

async fn get_document(
    State(state): State<Arc<ServerState>>,
    Path(path): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let path = DocumentPath::parse(&path)?;
    match state.documents.get(&path).await? {
        Some(doc) => Ok(Json(doc)),
        None => Err(StoreError::new(codes::NOT_FOUND)
            .with_message(format!("No document at {}", path))
            .into()),
    }
}

async fn put_document(
    State(state): State<Arc<ServerState>>,
    Path(path): Path<String>,
    Json(write): Json<DocumentWrite>,
) -> Result<Json<Document>, ApiError> {
    let path = DocumentPath::parse(&path)?;
    let stored = state.documents.put_sync(&path, write).map_err(StoreError::from)?;
    debug!("Stored {}", path);
    Ok(Json(stored))
}

// ============================================================================
// WEBSOCKET HANDLER
// ============================================================================

async fn subscribe_handler(
    ws: WebSocketUpgrade,
    Path(path): Path<String>,
    State(state): State<Arc<ServerState>>,
) -> Result<Response, ApiError> {
    let path = DocumentPath::parse(&path)?;
    info!("Subscription request for {}", path);
    Ok(ws.on_upgrade(move |socket| handle_subscription(socket, path, state)))
}

async fn handle_subscription(mut socket: WebSocket, path: DocumentPath, state: Arc<ServerState>) {
    let mut updates = match state.documents.subscribe(&path).await {
        Ok(updates) => updates,
        Err(e) => {
            warn!("Failed to subscribe to {}: {}", path, e);
            return;
        }
    };

    loop {
        tokio::select! {
            update = updates.next() => {
                let doc = match update {
                    Some(Ok(doc)) => doc,
                    Some(Err(e)) => {
                        warn!("Update feed for {} failed: {}", path, e);
                        break;
                    }
                    None => break,
                };
                let text = match serde_json::to_string(&doc) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode {}: {}", path, e);
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!("Subscription to {} closed", path);
}
