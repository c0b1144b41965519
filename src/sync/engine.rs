//! Remote sync engine.
//!
//! Levels are stored as one document per user:
//! `{ levels, levelOrder, lastModified }`, where `lastModified` is stamped by
//! the store. Conflicts resolve last-write-wins at whole-document
//! granularity; on equal timestamps the remote copy wins.

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::{SyncError, SyncResult};
use crate::levels::{derive_level_order, LevelKey, LevelOrder, LevelSnapshot, Levels, Millis};
use crate::remote::{Document, DocumentPath, DocumentStore, DocumentWrite};
use crate::state::UserId;

pub const FIELD_LEVELS: &str = "levels";
pub const FIELD_LEVEL_ORDER: &str = "levelOrder";
pub const FIELD_LAST_MODIFIED: &str = "lastModified";

/// Level content as read back from the remote document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLevels {
    pub levels: Levels,
    pub level_order: LevelOrder,
}

#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn DocumentStore>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Overwrite the user's document and return the `lastModified` the
    /// store stamped on it, if the store reported one.
    pub async fn upload(
        &self,
        user: &UserId,
        levels: &Levels,
        level_order: &[LevelKey],
    ) -> SyncResult<Option<Millis>> {
        let path = DocumentPath::user_levels(user).map_err(SyncError::write)?;
        let write = DocumentWrite::new(encode(levels, level_order))
            .with_server_timestamp(FIELD_LAST_MODIFIED);

        let stored = self.store.put(&path, write).await.map_err(|e| {
            warn!("Upload to {} failed: {}", path, e);
            SyncError::write(e)
        })?;

        let stamp = decode_timestamp(&stored);
        debug!("Uploaded {} levels to {} at {:?}", levels.len(), path, stamp);
        Ok(stamp)
    }

    /// The user's levels, or `None` when there is no usable remote copy
    pub async fn download(&self, user: &UserId) -> SyncResult<Option<RemoteLevels>> {
        let path = DocumentPath::user_levels(user).map_err(SyncError::read)?;
        let doc = self.store.get(&path).await.map_err(|e| {
            warn!("Download from {} failed: {}", path, e);
            SyncError::read(e)
        })?;
        Ok(doc.as_ref().and_then(decode_levels))
    }

    /// Reconcile local levels with the remote document and return the winner
    pub async fn merge(&self, user: &UserId, local: LevelSnapshot) -> SyncResult<LevelSnapshot> {
        let path = DocumentPath::user_levels(user).map_err(SyncError::read)?;
        let doc = self.store.get(&path).await.map_err(SyncError::read)?;

        let remote = doc.as_ref().and_then(decode_snapshot);
        let remote = match remote {
            Some(remote) => remote,
            None => {
                info!("No usable remote levels for {}, uploading local copy", user);
                self.upload(user, &local.levels, &local.level_order).await?;
                return Ok(local);
            }
        };

        if local.last_modified > remote.last_modified {
            info!(
                "Local levels win for {} ({} > {})",
                user, local.last_modified, remote.last_modified
            );
            self.upload(user, &local.levels, &local.level_order).await?;
            Ok(local)
        } else {
            info!(
                "Remote levels win for {} ({} >= {})",
                user, remote.last_modified, local.last_modified
            );
            Ok(remote)
        }
    }

    /// Handle for the live subscription owned by one session
    pub fn auto_sync(&self) -> AutoSync {
        AutoSync::new(self.clone())
    }
}

fn encode(levels: &Levels, level_order: &[LevelKey]) -> Document {
    let mut doc = Document::new();
    doc.insert(
        FIELD_LEVELS,
        serde_json::to_value(levels).unwrap_or_else(|_| Value::Object(Default::default())),
    );
    doc.insert(
        FIELD_LEVEL_ORDER,
        Value::Array(
            level_order
                .iter()
                .map(|k| Value::String(k.as_str().to_string()))
                .collect(),
        ),
    );
    doc
}

/// Levels and order from a document. Missing or malformed levels yield
/// `None`; a missing order is derived from the levels.
pub fn decode_levels(doc: &Document) -> Option<RemoteLevels> {
    let levels = match doc.get(FIELD_LEVELS) {
        Some(value) if value.is_object() => serde_json::from_value::<Levels>(value.clone()).ok()?,
        _ => return None,
    };

    let level_order = doc
        .get(FIELD_LEVEL_ORDER)
        .and_then(|value| serde_json::from_value::<LevelOrder>(value.clone()).ok())
        .unwrap_or_else(|| derive_level_order(&levels));

    Some(RemoteLevels {
        levels,
        level_order,
    })
}

/// Store timestamp in epoch millis, if present and numeric
pub fn decode_timestamp(doc: &Document) -> Option<Millis> {
    let value = doc.get(FIELD_LAST_MODIFIED)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as Millis))
}

fn decode_snapshot(doc: &Document) -> Option<LevelSnapshot> {
    let last_modified = decode_timestamp(doc)?;
    let remote = decode_levels(doc)?;
    Some(LevelSnapshot::new(
        remote.levels,
        remote.level_order,
        last_modified,
    ))
}

/// Cancels one live subscription. Calling it more than once is harmless.
#[derive(Clone)]
pub struct Unsubscribe {
    handle: AbortHandle,
}

impl Unsubscribe {
    pub fn unsubscribe(&self) {
        self.handle.abort();
    }
}

/// At most one live subscription at a time
pub struct AutoSync {
    engine: SyncEngine,
    current: Mutex<Option<Unsubscribe>>,
}

impl AutoSync {
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            engine,
            current: Mutex::new(None),
        }
    }

    /// Follow the user's document, replacing any previous subscription.
    ///
    /// `on_update` runs for every version that exists and decodes;
    /// `on_error` runs once if the subscription fails, which ends it.
    pub fn enable<U, E>(&self, user: &UserId, on_update: U, on_error: E) -> Unsubscribe
    where
        U: Fn(LevelSnapshot) + Send + 'static,
        E: Fn(SyncError) + Send + 'static,
    {
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            debug!("Replacing active level subscription");
            previous.unsubscribe();
        }

        let store = self.engine.store.clone();
        let user = user.clone();
        let task = tokio::spawn(async move {
            let path = match DocumentPath::user_levels(&user) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Cannot follow levels for {}: {}", user, e);
                    on_error(SyncError::read(e));
                    return;
                }
            };
            let mut stream = match store.subscribe(&path).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Subscription to {} failed: {}", path, e);
                    on_error(SyncError::read(e));
                    return;
                }
            };
            info!("Listening for level updates on {}", path);

            while let Some(item) = stream.next().await {
                match item {
                    Ok(Some(doc)) => match decode_snapshot(&doc) {
                        Some(snapshot) => on_update(snapshot),
                        None => debug!("Skipping unusable update on {}", path),
                    },
                    Ok(None) => debug!("{} does not exist yet", path),
                    Err(e) => {
                        warn!("Subscription to {} ended: {}", path, e);
                        on_error(SyncError::read(e));
                        return;
                    }
                }
            }
            debug!("Subscription to {} closed", path);
        });

        let handle = Unsubscribe {
            handle: task.abort_handle(),
        };
        *current = Some(handle.clone());
        handle
    }

    /// Stop the active subscription, if any
    pub fn disable(&self) {
        if let Some(current) = self.current.lock().take() {
            info!("Disabling level subscription");
            current.unsubscribe();
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.lock().is_some()
    }
}

impl Drop for AutoSync {
    fn drop(&mut self) {
        self.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::Level;
    use crate::storage::{SledDocumentStore, StorageConfig};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => Document::from(map),
            _ => panic!("object expected"),
        }
    }

    fn engine() -> (SyncEngine, SledDocumentStore) {
        let db = StorageConfig::temporary().open().unwrap();
        let store = SledDocumentStore::open(&db).unwrap();
        (SyncEngine::new(Arc::new(store.clone())), store)
    }

    #[test]
    fn test_decode_full_document() {
        let d = doc(json!({
            "levels": {"a": {"name": "A", "words": ["x"]}, "b": {"name": "B", "words": []}},
            "levelOrder": ["b", "a"],
            "lastModified": 2000
        }));
        let snapshot = decode_snapshot(&d).unwrap();
        assert_eq!(snapshot.level_order, vec![LevelKey::new("b"), LevelKey::new("a")]);
        assert_eq!(snapshot.last_modified, 2000);
        assert_eq!(snapshot.levels[&LevelKey::new("a")].words, vec!["x"]);
    }

    #[test]
    fn test_decode_derives_missing_order() {
        let d = doc(json!({"levels": {"b": {"name": "B"}, "a": {"name": "A"}}}));
        let remote = decode_levels(&d).unwrap();
        assert_eq!(remote.level_order, vec![LevelKey::new("a"), LevelKey::new("b")]);
        assert!(remote.levels[&LevelKey::new("a")].words.is_empty());
    }

    #[test]
    fn test_decode_malformed_levels_is_absent() {
        assert!(decode_levels(&doc(json!({"levelOrder": []}))).is_none());
        assert!(decode_levels(&doc(json!({"levels": [1, 2]}))).is_none());
        assert!(decode_levels(&doc(json!({"levels": {"a": 5}}))).is_none());
    }

    #[test]
    fn test_decode_timestamp() {
        assert_eq!(decode_timestamp(&doc(json!({"lastModified": 5}))), Some(5));
        assert_eq!(decode_timestamp(&doc(json!({"lastModified": 5.0}))), Some(5));
        assert_eq!(decode_timestamp(&doc(json!({"lastModified": "5"}))), None);
        assert_eq!(decode_timestamp(&doc(json!({}))), None);
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let (engine, _) = engine();
        let user = UserId::new("u1");
        let mut levels = Levels::new();
        levels.insert("a".into(), Level::new("A").with_words(["cat"]));
        let order: LevelOrder = vec!["a".into()];

        engine.upload(&user, &levels, &order).await.unwrap();
        let remote = engine.download(&user).await.unwrap().unwrap();
        assert_eq!(remote.levels, levels);
        assert_eq!(remote.level_order, order);
    }

    #[tokio::test]
    async fn test_upload_is_stamped_by_store() {
        let (engine, store) = engine();
        let user = UserId::new("u1");
        let stamp = engine.upload(&user, &Levels::new(), &[]).await.unwrap();

        let stored = store
            .get_sync(&DocumentPath::user_levels(&user).unwrap())
            .unwrap()
            .unwrap();
        assert!(stamp.unwrap() > 0);
        assert_eq!(decode_timestamp(&stored), stamp);
    }

    #[tokio::test]
    async fn test_invalid_user_id_is_rejected() {
        let (engine, store) = engine();
        let user = UserId::new("../admin");

        let err = engine.upload(&user, &Levels::new(), &[]).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteWrite { .. }));
        assert_eq!(err.code(), "invalid-argument");
        assert!(engine.download(&user).await.is_err());
        assert_eq!(store.count(), 0);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let auto = engine.auto_sync();
        auto.enable(&user, |_| {}, move |e| {
            let _ = tx.send(e);
        });
        let err = rx.recv().await.unwrap();
        assert!(matches!(err, SyncError::RemoteRead { .. }));
    }

    #[tokio::test]
    async fn test_download_missing_document() {
        let (engine, _) = engine();
        assert_eq!(engine.download(&UserId::new("nobody")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_auto_sync_replaces_previous_subscription() {
        let (engine, _) = engine();
        let auto = engine.auto_sync();
        assert!(!auto.is_active());

        let first = auto.enable(&UserId::new("a"), |_| {}, |_| {});
        let _second = auto.enable(&UserId::new("b"), |_| {}, |_| {});
        assert!(auto.is_active());

        first.unsubscribe();
        first.unsubscribe();
        auto.disable();
        auto.disable();
        assert!(!auto.is_active());
    }
}
