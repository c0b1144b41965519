//! Application state and the view-state machine that drives every screen.
//!
//! The state is mutated only through [`Action`]s applied by [`reduce`]. The
//! [`Store`] wraps that reducer with a clock, local persistence and a change
//! feed the sync coordinator listens on.

pub mod action;
pub mod policy;
pub mod reducer;
pub mod store;

pub use action::Action;
pub use reducer::{reduce, SCORE_INCREMENT};
pub use store::Store;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::levels::{default_levels, LevelContent, LevelOrder, LevelSnapshot, Levels, Millis};

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis()
}

/// Remote identity of the signed-in guardian
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named screens. `None` in [`AppState::current_screen`] means nothing rendered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Screen {
    Welcome,
    LevelSelect,
    ModeSelect,
    ParentLogin,
    ParentMode,
    AccountManagement,
    Game,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    Listen,
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Synced,
    Error,
    Offline,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
            SyncStatus::Offline => "offline",
        };
        f.write_str(label)
    }
}

/// Everything the presentation layer renders from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub levels: Levels,
    pub level_order: LevelOrder,
    pub current_screen: Option<Screen>,
    pub current_mode: Option<PlayMode>,
    pub current_word: Option<String>,
    /// Flattened words of the active level selection
    pub word_list: Vec<String>,
    pub level_name: String,
    pub score: u32,
    pub is_uppercase: bool,
    pub is_parent_logged_in: bool,
    pub user_id: Option<UserId>,
    pub sync_status: SyncStatus,
    /// Bumped only by level-content edits
    pub last_modified: Millis,
}

impl Default for AppState {
    fn default() -> Self {
        let (levels, level_order) = default_levels();
        Self {
            levels,
            level_order,
            current_screen: None,
            current_mode: None,
            current_word: None,
            word_list: Vec::new(),
            level_name: String::new(),
            score: 0,
            is_uppercase: false,
            is_parent_logged_in: false,
            user_id: None,
            sync_status: SyncStatus::Idle,
            last_modified: 0,
        }
    }
}

impl AppState {
    pub fn level_snapshot(&self) -> LevelSnapshot {
        LevelSnapshot::new(
            self.levels.clone(),
            self.level_order.clone(),
            self.last_modified,
        )
    }

    pub fn level_content(&self) -> LevelContent {
        LevelContent::new(&self.levels, &self.level_order)
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Subset of [`AppState`] merged in by `Action::LoadData`.
///
/// There is deliberately no screen field: screen identity never survives a
/// restart. Unknown fields (including a persisted `currentScreen`) are ignored
/// on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialState {
    pub levels: Option<Levels>,
    pub level_order: Option<LevelOrder>,
    pub current_mode: Option<PlayMode>,
    pub current_word: Option<String>,
    pub word_list: Option<Vec<String>>,
    pub level_name: Option<String>,
    pub score: Option<u32>,
    pub is_uppercase: Option<bool>,
    pub is_parent_logged_in: Option<bool>,
    pub user_id: Option<UserId>,
    pub sync_status: Option<SyncStatus>,
    pub last_modified: Option<Millis>,
}

impl PartialState {
    /// Apply every present field onto `state`
    pub fn merge_into(self, state: &mut AppState) {
        if let Some(levels) = self.levels {
            state.levels = levels;
        }
        if let Some(order) = self.level_order {
            state.level_order = order;
        }
        if let Some(mode) = self.current_mode {
            state.current_mode = Some(mode);
        }
        if let Some(word) = self.current_word {
            state.current_word = Some(word);
        }
        if let Some(words) = self.word_list {
            state.word_list = words;
        }
        if let Some(name) = self.level_name {
            state.level_name = name;
        }
        if let Some(score) = self.score {
            state.score = score;
        }
        if let Some(upper) = self.is_uppercase {
            state.is_uppercase = upper;
        }
        if let Some(parent) = self.is_parent_logged_in {
            state.is_parent_logged_in = parent;
        }
        if let Some(user) = self.user_id {
            state.user_id = Some(user);
        }
        if let Some(status) = self.sync_status {
            state.sync_status = status;
        }
        if let Some(ts) = self.last_modified {
            state.last_modified = ts;
        }
    }
}

impl From<&AppState> for PartialState {
    fn from(state: &AppState) -> Self {
        Self {
            levels: Some(state.levels.clone()),
            level_order: Some(state.level_order.clone()),
            current_mode: state.current_mode,
            current_word: state.current_word.clone(),
            word_list: Some(state.word_list.clone()),
            level_name: Some(state.level_name.clone()),
            score: Some(state.score),
            is_uppercase: Some(state.is_uppercase),
            is_parent_logged_in: Some(state.is_parent_logged_in),
            user_id: state.user_id.clone(),
            sync_status: Some(state.sync_status),
            last_modified: Some(state.last_modified),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = AppState::default();
        assert_eq!(state.levels.len(), 2);
        assert_eq!(state.level_order.len(), 2);
        assert_eq!(state.current_screen, None);
        assert_eq!(state.sync_status, SyncStatus::Idle);
        assert_eq!(state.last_modified, 0);
        assert!(!state.is_signed_in());
    }

    #[test]
    fn test_state_json_field_names() {
        let state = AppState::default();
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("levelOrder").is_some());
        assert!(json.get("lastModified").is_some());
        assert!(json.get("isParentLoggedIn").is_some());
        assert_eq!(json["syncStatus"], "idle");
    }

    #[test]
    fn test_partial_ignores_persisted_screen() {
        let partial: PartialState =
            serde_json::from_str(r#"{"currentScreen":"game","score":30}"#).unwrap();
        assert_eq!(partial.score, Some(30));
        assert_eq!(partial.levels, None);
    }

    #[test]
    fn test_partial_round_trip_restores_everything_but_screen() {
        let mut original = AppState::default();
        original.score = 40;
        original.current_screen = Some(Screen::Game);
        original.current_mode = Some(PlayMode::Write);
        original.user_id = Some(UserId::new("parent-1"));

        let json = serde_json::to_string(&original).unwrap();
        let partial: PartialState = serde_json::from_str(&json).unwrap();

        let mut restored = AppState::default();
        partial.merge_into(&mut restored);

        assert_eq!(restored.score, 40);
        assert_eq!(restored.current_mode, Some(PlayMode::Write));
        assert_eq!(restored.user_id, Some(UserId::new("parent-1")));
        assert_eq!(restored.current_screen, None);
    }
}
