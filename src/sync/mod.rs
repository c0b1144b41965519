//! Remote synchronization of level data.
//!
//! This module implements last-write-wins sync against a per-user document:
//! - [`SyncEngine`]: upload, download and merge, plus the live subscription
//! - [`UploadScheduler`]: debounce and minimum-visible status window
//! - [`SyncCoordinator`]: drives both from store changes and sign-in events

pub mod coordinator;
pub mod engine;
pub mod network;
pub mod scheduler;

pub use coordinator::{CoordinatorHandle, SyncCoordinator};
pub use engine::{AutoSync, RemoteLevels, SyncEngine, Unsubscribe};
pub use network::NetworkStatus;
pub use scheduler::UploadScheduler;

use std::time::Duration;
use thiserror::Error;

use crate::remote::{codes, StoreError};

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Failed to read remote levels: {message}")]
    RemoteRead { code: String, message: String },

    #[error("Failed to write remote levels: {message}")]
    RemoteWrite { code: String, message: String },
}

impl SyncError {
    pub fn read(err: StoreError) -> Self {
        SyncError::RemoteRead {
            message: describe_store_error(&err),
            code: err.code,
        }
    }

    pub fn write(err: StoreError) -> Self {
        SyncError::RemoteWrite {
            message: describe_store_error(&err),
            code: err.code,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            SyncError::RemoteRead { code, .. } | SyncError::RemoteWrite { code, .. } => code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SyncError::RemoteRead { message, .. } | SyncError::RemoteWrite { message, .. } => {
                message
            }
        }
    }
}

/// Human-readable text for a store failure
pub fn describe_store_error(err: &StoreError) -> String {
    let known = match err.code.as_str() {
        codes::PERMISSION_DENIED => Some("You don't have permission to access this data."),
        codes::UNAUTHENTICATED => Some("Please sign in again to sync your levels."),
        codes::UNAVAILABLE => Some("The sync service is unavailable. Check your connection."),
        codes::DEADLINE_EXCEEDED => Some("The sync request timed out. Please try again."),
        codes::RESOURCE_EXHAUSTED => Some("Too many requests. Please wait a moment."),
        codes::NOT_FOUND => Some("Your saved levels could not be found."),
        codes::CANCELLED => Some("The sync request was cancelled."),
        _ => None,
    };

    match (known, &err.message) {
        (Some(text), _) => text.to_string(),
        (None, Some(raw)) if !raw.is_empty() => raw.clone(),
        _ => "An unexpected sync error occurred.".to_string(),
    }
}

/// Configuration for sync timing
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period after the last level edit before uploading
    pub debounce: Duration,
    /// Minimum time the syncing status stays visible
    pub min_visible: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            min_visible: Duration::from_millis(1000),
        }
    }
}

impl SyncConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_min_visible(mut self, min_visible: Duration) -> Self {
        self.min_visible = min_visible;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_use_table() {
        let err = SyncError::write(StoreError::new("permission-denied").with_message("raw"));
        assert_eq!(err.code(), "permission-denied");
        assert_eq!(
            err.message(),
            "You don't have permission to access this data."
        );
        assert!(err.to_string().starts_with("Failed to write remote levels"));
    }

    #[test]
    fn test_unknown_code_falls_back_to_raw_message() {
        let err = SyncError::read(StoreError::new("aborted").with_message("transaction aborted"));
        assert_eq!(err.message(), "transaction aborted");
    }

    #[test]
    fn test_unknown_code_without_message_is_generic() {
        let err = SyncError::read(StoreError::new("aborted"));
        assert_eq!(err.message(), "An unexpected sync error occurred.");
    }

    #[test]
    fn test_sync_config_default() {
        let config = SyncConfig::default();
        assert_eq!(config.debounce, Duration::from_millis(500));
        assert_eq!(config.min_visible, Duration::from_millis(1000));
    }
}
