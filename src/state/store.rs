//! Dispatching store.
//!
//! Applies actions in dispatch order, mirrors every new state to local
//! persistence and publishes it on a watch channel.

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{now_millis, reduce, Action, AppState};
use crate::levels::Millis;
use crate::storage::Persistence;

pub struct Store {
    state: Mutex<AppState>,
    persistence: Option<Persistence>,
    changes: watch::Sender<AppState>,
}

impl Store {
    pub fn new(initial: AppState) -> Self {
        let (changes, _) = watch::channel(initial.clone());
        Self {
            state: Mutex::new(initial),
            persistence: None,
            changes,
        }
    }

    /// Initial state from local persistence, falling back to defaults
    pub fn restore(persistence: Persistence) -> Self {
        let initial = persistence.bootstrap();
        Self::new(initial).with_persistence(persistence)
    }

    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn dispatch(&self, action: Action) -> AppState {
        self.dispatch_at(action, now_millis())
    }

    /// Dispatch with an explicit clock reading
    pub fn dispatch_at(&self, action: Action, now: Millis) -> AppState {
        let mut state = self.state.lock();
        let name = action.name();
        let next = reduce(&state, action, now);
        if next == *state {
            debug!("Action {} left state unchanged", name);
            return next;
        }
        *state = next.clone();

        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(&next) {
                warn!("Failed to persist state after {}: {}", name, e);
            }
        }

        self.changes.send_replace(next.clone());
        next
    }

    pub fn state(&self) -> AppState {
        self.state.lock().clone()
    }

    /// Receiver that observes every published state
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PlayMode, Screen};
    use crate::storage::{LocalStore, StorageConfig};

    fn temp_persistence() -> Persistence {
        let db = StorageConfig::temporary().open().unwrap();
        Persistence::new(LocalStore::open(&db).unwrap())
    }

    #[test]
    fn test_dispatch_applies_in_order() {
        let store = Store::new(AppState::default());
        store.dispatch(Action::SetScore(10));
        store.dispatch(Action::IncrementScore);
        assert_eq!(store.state().score, 20);
    }

    #[test]
    fn test_dispatch_publishes_changes() {
        let store = Store::new(AppState::default());
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.dispatch(Action::SetScreen(Screen::LevelSelect));
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().current_screen,
            Some(Screen::LevelSelect)
        );
    }

    #[test]
    fn test_noop_dispatch_is_not_published() {
        let store = Store::new(AppState::default());
        let mut rx = store.subscribe();
        store.dispatch(Action::SetScore(0));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_state_survives_restart_except_screen() {
        let persistence = temp_persistence();

        let store = Store::restore(persistence.clone());
        store.dispatch(Action::SetScreen(Screen::Game));
        store.dispatch(Action::SetMode(Some(PlayMode::Read)));
        store.dispatch(Action::AddWord {
            level_key: "level1".into(),
            word: "zoo".into(),
        });
        drop(store);

        let restored = Store::restore(persistence);
        let state = restored.state();
        assert_eq!(state.current_screen, None);
        assert_eq!(state.current_mode, Some(PlayMode::Read));
        assert!(state.levels[&"level1".into()].contains("zoo"));
        assert!(state.last_modified > 0);
    }
}
