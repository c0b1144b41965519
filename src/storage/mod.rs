//! Storage module backed by the Sled embedded database.
//!
//! Two stores share one database:
//! - [`LocalStore`]: the device-local key-value store the app state blob lives in
//! - [`SledDocumentStore`]: JSON documents with live change feeds, served by
//!   `wordplay-server`

pub mod documents;
pub mod local;

pub use documents::SledDocumentStore;
pub use local::{LocalStore, Persistence, STATE_KEY};

use sled::Db;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Sled database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corruption detected in {0}")]
    Corruption(String),

    #[error("Storage initialization failed: {0}")]
    InitFailed(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Configuration for the storage layer
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the Sled database directory
    pub path: String,
    /// Cache size in bytes (default: 64MB)
    pub cache_size: u64,
    /// Flush interval in milliseconds (0 = only on explicit flush)
    pub flush_interval_ms: u64,
    /// In-memory database removed on drop
    pub temporary: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./data/wordplay.sled".to_string(),
            cache_size: 64 * 1024 * 1024,
            flush_interval_ms: 500,
            temporary: false,
        }
    }
}

impl StorageConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Default::default()
        }
    }

    pub fn with_cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_flush_interval(mut self, ms: u64) -> Self {
        self.flush_interval_ms = ms;
        self
    }

    /// Open or create the database this config describes
    pub fn open(&self) -> StorageResult<Db> {
        let config = sled::Config::new()
            .cache_capacity(self.cache_size)
            .flush_every_ms(if self.flush_interval_ms > 0 {
                Some(self.flush_interval_ms)
            } else {
                None
            });

        if self.temporary {
            return Ok(config.temporary(true).open()?);
        }

        // Ensure parent directory exists
        if let Some(parent) = Path::new(&self.path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::InitFailed(format!("Failed to create directory: {}", e))
            })?;
        }

        Ok(config.path(&self.path).open()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert!(!config.temporary);
        assert_eq!(config.path, "./data/wordplay.sled");
        assert_eq!(config.flush_interval_ms, 500);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("db.sled");
        let config = StorageConfig::new(path.to_string_lossy().to_string()).with_flush_interval(0);

        let db = config.open().unwrap();
        db.insert("k", "v").unwrap();
        assert!(path.parent().unwrap().exists());
    }

    #[test]
    fn test_temporary_database() {
        let db = StorageConfig::temporary().with_cache_size(1024 * 1024).open().unwrap();
        assert!(db.get("missing").unwrap().is_none());
    }
}
