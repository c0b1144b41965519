#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use wordplay::levels::{Level, LevelSnapshot, Levels};
use wordplay::remote::{
    Document, DocumentPath, DocumentStore, DocumentStream, DocumentWrite, StoreError, StoreResult,
};
use wordplay::state::UserId;
use wordplay::storage::{SledDocumentStore, StorageConfig};

/// In-memory document store that counts writes and can be told to fail
pub struct RecordingStore {
    inner: SledDocumentStore,
    puts: AtomicUsize,
    fail_puts: AtomicBool,
    fail_gets: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        let db = StorageConfig::temporary().open().unwrap();
        Arc::new(Self {
            inner: SledDocumentStore::open(&db).unwrap(),
            puts: AtomicUsize::new(0),
            fail_puts: AtomicBool::new(false),
            fail_gets: AtomicBool::new(false),
        })
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Write a raw document, bypassing the counters
    pub fn seed(&self, user: &UserId, value: Value) {
        let data = match value {
            Value::Object(map) => Document::from(map),
            _ => panic!("object expected"),
        };
        self.inner
            .put_sync(&DocumentPath::user_levels(user).unwrap(), DocumentWrite::new(data))
            .unwrap();
    }

    pub fn stored(&self, user: &UserId) -> Option<Document> {
        self.inner
            .get_sync(&DocumentPath::user_levels(user).unwrap())
            .unwrap()
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::new("permission-denied").with_message("denied"));
        }
        self.inner.get(path).await
    }

    async fn put(&self, path: &DocumentPath, write: DocumentWrite) -> StoreResult<Document> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection reset"));
        }
        self.inner.put(path, write).await
    }

    async fn subscribe(&self, path: &DocumentPath) -> StoreResult<DocumentStream> {
        self.inner.subscribe(path).await
    }
}

pub fn levels_with(key: &str, name: &str, words: &[&str]) -> Levels {
    let mut levels = Levels::new();
    levels.insert(key.into(), Level::new(name).with_words(words.iter().copied()));
    levels
}

pub fn snapshot(key: &str, name: &str, last_modified: i64) -> LevelSnapshot {
    LevelSnapshot::new(levels_with(key, name, &[]), vec![key.into()], last_modified)
}

pub fn remote_doc(key: &str, name: &str, last_modified: i64) -> Value {
    json!({
        "levels": { key: { "name": name, "words": [] } },
        "levelOrder": [key],
        "lastModified": last_modified
    })
}
