//! Embedded JSON document store with live change feeds.
//!
//! Backs `wordplay-server`. Each write replaces the whole document and is
//! fanned out to subscribers of that path over a broadcast channel. A path's
//! channel is dropped once its last subscriber goes away.

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;
use sled::{Db, Tree};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

use super::{StorageError, StorageResult};
use crate::levels::Millis;
use crate::remote::{
    Document, DocumentPath, DocumentStore, DocumentStream, DocumentWrite, StoreError, StoreResult,
};
use crate::state::now_millis;

const TREE_DOCUMENTS: &str = "documents";

/// Buffered versions per subscriber before it is considered lagging
const CHANNEL_CAPACITY: usize = 64;

type Channels = DashMap<String, broadcast::Sender<Option<Document>>>;

#[derive(Clone)]
pub struct SledDocumentStore {
    documents: Tree,
    channels: Arc<Channels>,
    write_lock: Arc<Mutex<()>>,
}

impl SledDocumentStore {
    pub fn open(db: &Db) -> StorageResult<Self> {
        Ok(Self {
            documents: db.open_tree(TREE_DOCUMENTS)?,
            channels: Arc::new(DashMap::new()),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn get_sync(&self, path: &DocumentPath) -> StorageResult<Option<Document>> {
        read_document(&self.documents, path)
    }

    /// Store a write and notify subscribers. Returns the stored document.
    pub fn put_sync(&self, path: &DocumentPath, write: DocumentWrite) -> StorageResult<Document> {
        let _guard = self.write_lock.lock();

        let stamp = match &write.server_timestamp {
            Some(field) => {
                let previous = self
                    .get_sync(path)?
                    .and_then(|doc| doc.get(field).and_then(|v| v.as_i64()));
                next_stamp(now_millis(), previous)
            }
            None => now_millis(),
        };

        let doc = write.apply(stamp);
        let bytes = serde_json::to_vec(&doc)?;
        self.documents.insert(path.as_str().as_bytes(), bytes)?;

        if let Some(tx) = self.channels.get(path.as_str()) {
            let receivers = tx.send(Some(doc.clone())).unwrap_or(0);
            debug!("Notified {} subscribers of {}", receivers, path);
        }

        Ok(doc)
    }

    pub fn count(&self) -> usize {
        self.documents.len()
    }

    /// Paths with at least one live subscriber
    pub fn watched_paths(&self) -> usize {
        self.channels.len()
    }

    fn channel(&self, path: &DocumentPath) -> broadcast::Receiver<Option<Document>> {
        self.channels
            .entry(path.as_str().to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

fn read_document(tree: &Tree, path: &DocumentPath) -> StorageResult<Option<Document>> {
    match tree.get(path.as_str().as_bytes())? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Broadcast receiver that releases its path's channel when dropped
struct Feed {
    updates: Option<BroadcastStream<Option<Document>>>,
    channels: Arc<Channels>,
    key: String,
}

impl Stream for Feed {
    type Item = Result<Option<Document>, BroadcastStreamRecvError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.updates.as_mut() {
            Some(updates) => Pin::new(updates).poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        // The receiver must be gone before the count is checked.
        self.updates.take();
        if self
            .channels
            .remove_if(&self.key, |_, tx| tx.receiver_count() == 0)
            .is_some()
        {
            debug!("Released channel for {}", self.key);
        }
    }
}

/// Server time, kept strictly increasing per document
fn next_stamp(now: Millis, previous: Option<Millis>) -> Millis {
    match previous {
        Some(prev) => now.max(prev.saturating_add(1)),
        None => now,
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::internal(err.to_string())
    }
}

#[async_trait]
impl DocumentStore for SledDocumentStore {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        Ok(self.get_sync(path)?)
    }

    async fn put(&self, path: &DocumentPath, write: DocumentWrite) -> StoreResult<Document> {
        Ok(self.put_sync(path, write)?)
    }

    async fn subscribe(&self, path: &DocumentPath) -> StoreResult<DocumentStream> {
        // Subscribe before reading so no write between the two is missed.
        let feed = Feed {
            updates: Some(BroadcastStream::new(self.channel(path))),
            channels: self.channels.clone(),
            key: path.as_str().to_string(),
        };
        let current = self.get_sync(path)?;

        let tree = self.documents.clone();
        let path = path.clone();
        let updates = feed.map(move |item| match item {
            Ok(doc) => Ok(doc),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!("Subscriber of {} lagged by {} versions", path, skipped);
                read_document(&tree, &path).map_err(StoreError::from)
            }
        });

        Ok(stream::once(async move { Ok(current) })
            .chain(updates)
            .boxed())
    }
}
