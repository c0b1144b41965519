//! Device-local key-value store and the state persistence adapter on top of it.

use sled::{Db, Tree};
use tracing::{debug, warn};

use super::{StorageError, StorageResult};
use crate::state::{reduce, Action, AppState, PartialState};

/// Key the serialized application state lives under
pub const STATE_KEY: &str = "wordGameState";

const TREE_LOCAL: &str = "local";

/// String key-value store
#[derive(Clone)]
pub struct LocalStore {
    tree: Tree,
}

impl LocalStore {
    pub fn open(db: &Db) -> StorageResult<Self> {
        Ok(Self {
            tree: db.open_tree(TREE_LOCAL)?,
        })
    }

    pub fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StorageError::Corruption(format!("local key {}", key))),
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.tree.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> StorageResult<()> {
        self.tree.remove(key.as_bytes())?;
        Ok(())
    }
}

/// Mirrors the application state to the local store
#[derive(Clone)]
pub struct Persistence {
    store: LocalStore,
}

impl Persistence {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Previously saved state, if any could be read back
    pub fn load(&self) -> Option<PartialState> {
        let blob = match self.store.get(STATE_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!("No saved state under {}", STATE_KEY);
                return None;
            }
            Err(e) => {
                warn!("Failed to read saved state: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&blob) {
            Ok(partial) => Some(partial),
            Err(e) => {
                warn!("Discarding unreadable saved state: {}", e);
                None
            }
        }
    }

    pub fn save(&self, state: &AppState) -> StorageResult<()> {
        let blob = serde_json::to_string(state)?;
        self.store.set(STATE_KEY, &blob)
    }

    /// Defaults overlaid with the saved state. The screen always starts fresh.
    pub fn bootstrap(&self) -> AppState {
        let initial = AppState::default();
        match self.load() {
            Some(partial) => reduce(&initial, Action::load(partial), 0),
            None => initial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Screen, SyncStatus, UserId};
    use crate::storage::StorageConfig;
    use tempfile::tempdir;

    fn test_local(db: &Db) -> LocalStore {
        LocalStore::open(db).unwrap()
    }

    #[test]
    fn test_local_set_get_remove() {
        let db = StorageConfig::temporary().open().unwrap();
        let store = test_local(&db);

        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "value").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("value".to_string()));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_bootstrap_without_saved_state() {
        let db = StorageConfig::temporary().open().unwrap();
        let persistence = Persistence::new(test_local(&db));
        assert_eq!(persistence.bootstrap(), AppState::default());
    }

    #[test]
    fn test_bootstrap_ignores_corrupt_blob() {
        let db = StorageConfig::temporary().open().unwrap();
        let store = test_local(&db);
        store.set(STATE_KEY, "{not json").unwrap();

        let persistence = Persistence::new(store);
        assert!(persistence.load().is_none());
        assert_eq!(persistence.bootstrap(), AppState::default());
    }

    #[test]
    fn test_saved_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path().join("local.sled").to_string_lossy().to_string())
            .with_flush_interval(0);

        let mut state = AppState::default();
        state.score = 70;
        state.current_screen = Some(Screen::Game);
        state.user_id = Some(UserId::new("parent"));
        state.sync_status = SyncStatus::Syncing;
        state.last_modified = 1234;

        {
            let db = config.open().unwrap();
            Persistence::new(test_local(&db)).save(&state).unwrap();
            db.flush().unwrap();
        }

        let db = config.open().unwrap();
        let restored = Persistence::new(test_local(&db)).bootstrap();
        assert_eq!(restored.score, 70);
        assert_eq!(restored.user_id, Some(UserId::new("parent")));
        assert_eq!(restored.last_modified, 1234);
        assert_eq!(restored.current_screen, None);
        assert_eq!(restored.sync_status, SyncStatus::Syncing);
    }

    #[test]
    fn test_blob_uses_state_key_and_camel_case() {
        let db = StorageConfig::temporary().open().unwrap();
        let store = test_local(&db);
        Persistence::new(store.clone())
            .save(&AppState::default())
            .unwrap();

        let blob = store.get(STATE_KEY).unwrap().unwrap();
        assert!(blob.contains("\"levelOrder\""));
        assert!(blob.contains("\"lastModified\":0"));
    }
}
