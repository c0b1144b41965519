//! The closed set of state transitions.

use super::{PartialState, PlayMode, Screen, SyncStatus, UserId};
use crate::levels::{Level, LevelKey, LevelOrder, LevelSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Merge a persisted snapshot; never touches the current screen
    LoadData(Box<PartialState>),
    SetScreen(Screen),
    SetMode(Option<PlayMode>),
    SetCurrentWord(Option<String>),
    SetScore(u32),
    IncrementScore,
    /// Active selection: a single level or all levels combined
    SetLevelData {
        level_name: String,
        word_list: Vec<String>,
    },
    AddLevel {
        key: LevelKey,
        level: Level,
    },
    RemoveLevel(LevelKey),
    UpdateLevelOrder(LevelOrder),
    UpdateLevelName {
        key: LevelKey,
        name: String,
    },
    AddWord {
        level_key: LevelKey,
        word: String,
    },
    RemoveWord {
        level_key: LevelKey,
        word: String,
    },
    SetParentLogin(bool),
    ToggleCase,
    ResetGame,
    SetUserId(Option<UserId>),
    SetSyncStatus(SyncStatus),
    /// Result of a remote merge or a push update
    SyncLevels(LevelSnapshot),
    UpdateLastModified,
}

impl Action {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LoadData(_) => "load_data",
            Self::SetScreen(_) => "set_screen",
            Self::SetMode(_) => "set_mode",
            Self::SetCurrentWord(_) => "set_current_word",
            Self::SetScore(_) => "set_score",
            Self::IncrementScore => "increment_score",
            Self::SetLevelData { .. } => "set_level_data",
            Self::AddLevel { .. } => "add_level",
            Self::RemoveLevel(_) => "remove_level",
            Self::UpdateLevelOrder(_) => "update_level_order",
            Self::UpdateLevelName { .. } => "update_level_name",
            Self::AddWord { .. } => "add_word",
            Self::RemoveWord { .. } => "remove_word",
            Self::SetParentLogin(_) => "set_parent_login",
            Self::ToggleCase => "toggle_case",
            Self::ResetGame => "reset_game",
            Self::SetUserId(_) => "set_user_id",
            Self::SetSyncStatus(_) => "set_sync_status",
            Self::SyncLevels(_) => "sync_levels",
            Self::UpdateLastModified => "update_last_modified",
        }
    }

    /// Local edits to level content; these bump `last_modified`
    pub const fn edits_levels(&self) -> bool {
        matches!(
            self,
            Self::AddLevel { .. }
                | Self::RemoveLevel(_)
                | Self::UpdateLevelOrder(_)
                | Self::UpdateLevelName { .. }
                | Self::AddWord { .. }
                | Self::RemoveWord { .. }
        )
    }

    pub fn load(partial: PartialState) -> Self {
        Self::LoadData(Box::new(partial))
    }
}
