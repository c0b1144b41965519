//! HTTP/WebSocket client for a hosted document store.
//!
//! Reads and writes go over plain HTTP; subscriptions hold a WebSocket open and
//! receive one JSON text frame per document version.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};

use super::{
    codes, Document, DocumentPath, DocumentStore, DocumentStream, DocumentWrite, StoreError,
    StoreResult,
};

/// Error body returned by the document service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn document_url(&self, path: &DocumentPath) -> String {
        format!("{}/documents/{}", self.base_url, path)
    }

    fn subscribe_url(&self, path: &DocumentPath) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/subscribe/{}", ws_base, path)
    }

    async fn error_from_response(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => StoreError {
                code: parsed.code,
                message: parsed.message,
            },
            Err(_) if body.is_empty() => StoreError::new(code_for_status(status)),
            Err(_) => StoreError::new(code_for_status(status)).with_message(body),
        }
    }
}

/// Store error code for an HTTP status
pub fn code_for_status(status: u16) -> &'static str {
    match status {
        400 => codes::INVALID_ARGUMENT,
        401 => codes::UNAUTHENTICATED,
        403 => codes::PERMISSION_DENIED,
        404 => codes::NOT_FOUND,
        408 => codes::DEADLINE_EXCEEDED,
        429 => codes::RESOURCE_EXHAUSTED,
        499 => codes::CANCELLED,
        500..=599 => codes::UNAVAILABLE,
        _ => codes::UNKNOWN,
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::new(codes::DEADLINE_EXCEEDED).with_message(err.to_string())
    } else if let Some(status) = err.status() {
        StoreError::new(code_for_status(status.as_u16())).with_message(err.to_string())
    } else {
        StoreError::unavailable(err.to_string())
    }
}

fn websocket_error(err: tokio_tungstenite::tungstenite::Error) -> StoreError {
    use tokio_tungstenite::tungstenite::Error;
    match err {
        Error::Http(response) => {
            StoreError::new(code_for_status(response.status().as_u16()))
                .with_message("Subscription rejected")
        }
        other => StoreError::unavailable(other.to_string()),
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let response = self
            .client
            .get(self.document_url(path))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let doc = response.json::<Document>().await.map_err(transport_error)?;
        Ok(Some(doc))
    }

    async fn put(&self, path: &DocumentPath, write: DocumentWrite) -> StoreResult<Document> {
        let response = self
            .client
            .put(self.document_url(path))
            .json(&write)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let stored = response.json::<Document>().await.map_err(transport_error)?;
        debug!("Stored document {}", path);
        Ok(stored)
    }

    async fn subscribe(&self, path: &DocumentPath) -> StoreResult<DocumentStream> {
        let url = self.subscribe_url(path);
        let (socket, _) = connect_async(url.as_str()).await.map_err(websocket_error)?;
        info!("Subscribed to {}", path);

        let stream = socket.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => Some(
                    serde_json::from_str::<Option<Document>>(&text)
                        .map_err(|e| StoreError::internal(format!("Malformed update: {}", e))),
                ),
                Ok(_) => None,
                Err(e) => Some(Err(StoreError::unavailable(e.to_string()))),
            }
        });

        Ok(stream.boxed())
    }
}
