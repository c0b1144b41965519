//! Remote document store interface.
//!
//! The sync engine talks to a per-user document through [`DocumentStore`].
//! Documents are plain JSON objects addressed by a slash-separated path; the
//! store, not the client, stamps write timestamps. Path segments are limited
//! to URL-safe characters so a path maps onto one URL unchanged.

pub mod http;

pub use http::HttpDocumentStore;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::levels::Millis;
use crate::state::UserId;

/// Well-known store error codes
pub mod codes {
    pub const PERMISSION_DENIED: &str = "permission-denied";
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const UNAVAILABLE: &str = "unavailable";
    pub const DEADLINE_EXCEEDED: &str = "deadline-exceeded";
    pub const RESOURCE_EXHAUSTED: &str = "resource-exhausted";
    pub const NOT_FOUND: &str = "not-found";
    pub const CANCELLED: &str = "cancelled";
    pub const INVALID_ARGUMENT: &str = "invalid-argument";
    pub const INTERNAL: &str = "internal";
    pub const UNKNOWN: &str = "unknown";
}

/// Failure reported by a document store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}{}", detail(.message))]
pub struct StoreError {
    pub code: String,
    pub message: Option<String>,
}

fn detail(message: &Option<String>) -> String {
    match message {
        Some(msg) => format!(": {}", msg),
        None => String::new(),
    }
}

impl StoreError {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(codes::UNAVAILABLE).with_message(message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_ARGUMENT).with_message(message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL).with_message(message)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Live feed of a document. `None` means the document does not exist.
pub type DocumentStream = BoxStream<'static, StoreResult<Option<Document>>>;

/// A stored JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(pub Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Whole-document write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentWrite {
    pub data: Document,
    /// Field the store fills with its own clock, in epoch millis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<String>,
}

impl DocumentWrite {
    pub fn new(data: Document) -> Self {
        Self {
            data,
            server_timestamp: None,
        }
    }

    pub fn with_server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.server_timestamp = Some(field.into());
        self
    }

    /// The document as stored at server time `now`
    pub fn apply(self, now: Millis) -> Document {
        let mut doc = self.data;
        if let Some(field) = self.server_timestamp {
            doc.insert(field, Value::from(now));
        }
        doc
    }
}

/// Slash-separated document address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath(String);

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | '+' | '~'))
}

impl DocumentPath {
    /// The per-user document holding level data
    pub fn user_levels(user: &UserId) -> StoreResult<Self> {
        if !is_valid_segment(user.as_str()) {
            return Err(StoreError::invalid_argument(format!(
                "Invalid user id: {:?}",
                user.as_str()
            )));
        }
        Ok(Self(format!("users/{}/levels", user)))
    }

    pub fn parse(path: &str) -> StoreResult<Self> {
        let trimmed = path.trim_matches('/');
        let valid = !trimmed.is_empty() && trimmed.split('/').all(is_valid_segment);
        if !valid {
            return Err(StoreError::invalid_argument(format!(
                "Invalid document path: {}",
                path
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-path JSON document storage with live subscriptions
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>>;

    /// Replace the document. Returns it as stored, server fields included.
    async fn put(&self, path: &DocumentPath, write: DocumentWrite) -> StoreResult<Document>;

    /// Yields the current document first, then every later version
    async fn subscribe(&self, path: &DocumentPath) -> StoreResult<DocumentStream>;
}
