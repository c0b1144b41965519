//! Checked level editing.
//!
//! The reducer accepts any level action as given. These helpers enforce the
//! rules the parent screens rely on (unique keys, at least one level, no
//! duplicate words) and turn a valid request into the action to dispatch.

use std::collections::HashSet;
use thiserror::Error;

use super::{Action, AppState};
use crate::levels::{Level, LevelKey, LevelOrder, Millis};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Level name cannot be empty")]
    EmptyLevelName,

    #[error("Word cannot be empty")]
    EmptyWord,

    #[error("Level not found: {0}")]
    UnknownLevel(LevelKey),

    #[error("Cannot remove the last remaining level")]
    LastLevel,

    #[error("\"{word}\" is already in {level}")]
    DuplicateWord { level: String, word: String },

    #[error("New order must contain every level exactly once")]
    InvalidOrder,
}

pub type PolicyResult<T> = Result<T, PolicyError>;

/// Normalized form words are stored in
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Fresh key for a level created at `now`; never collides with an existing key
pub fn unique_level_key(state: &AppState, now: Millis) -> LevelKey {
    let key = LevelKey::generate(now);
    if !state.levels.contains_key(&key) {
        return key;
    }
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    LevelKey::new(format!("{}_{}", key, &suffix[..8]))
}

pub fn add_level(state: &AppState, name: &str, now: Millis) -> PolicyResult<Action> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PolicyError::EmptyLevelName);
    }
    Ok(Action::AddLevel {
        key: unique_level_key(state, now),
        level: Level::new(name),
    })
}

pub fn remove_level(state: &AppState, key: &LevelKey) -> PolicyResult<Action> {
    if !state.levels.contains_key(key) {
        return Err(PolicyError::UnknownLevel(key.clone()));
    }
    if state.levels.len() <= 1 {
        return Err(PolicyError::LastLevel);
    }
    Ok(Action::RemoveLevel(key.clone()))
}

pub fn rename_level(state: &AppState, key: &LevelKey, name: &str) -> PolicyResult<Action> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PolicyError::EmptyLevelName);
    }
    if !state.levels.contains_key(key) {
        return Err(PolicyError::UnknownLevel(key.clone()));
    }
    Ok(Action::UpdateLevelName {
        key: key.clone(),
        name: name.to_string(),
    })
}

pub fn add_word(state: &AppState, key: &LevelKey, word: &str) -> PolicyResult<Action> {
    let word = normalize_word(word);
    if word.is_empty() {
        return Err(PolicyError::EmptyWord);
    }
    let level = state
        .levels
        .get(key)
        .ok_or_else(|| PolicyError::UnknownLevel(key.clone()))?;
    if level.contains(&word) {
        return Err(PolicyError::DuplicateWord {
            level: level.name.clone(),
            word,
        });
    }
    Ok(Action::AddWord {
        level_key: key.clone(),
        word,
    })
}

pub fn remove_word(state: &AppState, key: &LevelKey, word: &str) -> PolicyResult<Action> {
    if !state.levels.contains_key(key) {
        return Err(PolicyError::UnknownLevel(key.clone()));
    }
    Ok(Action::RemoveWord {
        level_key: key.clone(),
        word: word.to_string(),
    })
}

/// `order` must be a permutation of the existing level keys
pub fn reorder_levels(state: &AppState, order: LevelOrder) -> PolicyResult<Action> {
    let unique: HashSet<&LevelKey> = order.iter().collect();
    let complete = unique.len() == order.len()
        && order.len() == state.levels.len()
        && order.iter().all(|k| state.levels.contains_key(k));
    if !complete {
        return Err(PolicyError::InvalidOrder);
    }
    Ok(Action::UpdateLevelOrder(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::reduce;

    const NOW: Millis = 1_700_000_000_000;

    #[test]
    fn test_add_level_generates_time_key() {
        let state = AppState::default();
        let action = add_level(&state, "  Animals ", NOW).unwrap();
        assert_eq!(
            action,
            Action::AddLevel {
                key: LevelKey::new("level_1700000000000"),
                level: Level::new("Animals"),
            }
        );
    }

    #[test]
    fn test_add_level_avoids_collision() {
        let state = reduce(&AppState::default(), add_level(&AppState::default(), "A", NOW).unwrap(), NOW);
        let action = add_level(&state, "B", NOW).unwrap();
        match action {
            Action::AddLevel { key, .. } => {
                assert!(!state.levels.contains_key(&key));
                assert!(key.as_str().starts_with("level_1700000000000_"));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_add_level_rejects_blank_name() {
        assert_eq!(
            add_level(&AppState::default(), "   ", NOW),
            Err(PolicyError::EmptyLevelName)
        );
    }

    #[test]
    fn test_remove_level_guards_last_level() {
        let state = reduce(
            &AppState::default(),
            Action::RemoveLevel("level2".into()),
            NOW,
        );
        assert_eq!(
            remove_level(&state, &"level1".into()),
            Err(PolicyError::LastLevel)
        );
        assert!(remove_level(&AppState::default(), &"level1".into()).is_ok());
    }

    #[test]
    fn test_remove_unknown_level() {
        assert_eq!(
            remove_level(&AppState::default(), &"nope".into()),
            Err(PolicyError::UnknownLevel("nope".into()))
        );
    }

    #[test]
    fn test_add_word_normalizes_and_deduplicates() {
        let state = AppState::default();
        let action = add_word(&state, &"level2".into(), "  Zebra ").unwrap();
        assert_eq!(
            action,
            Action::AddWord {
                level_key: "level2".into(),
                word: "zebra".into(),
            }
        );

        let err = add_word(&state, &"level2".into(), "CAT").unwrap_err();
        assert!(matches!(err, PolicyError::DuplicateWord { .. }));
        assert_eq!(
            add_word(&state, &"level2".into(), " "),
            Err(PolicyError::EmptyWord)
        );
    }

    #[test]
    fn test_rename_level() {
        let state = AppState::default();
        assert!(rename_level(&state, &"level1".into(), "First").is_ok());
        assert_eq!(
            rename_level(&state, &"level1".into(), ""),
            Err(PolicyError::EmptyLevelName)
        );
        assert!(rename_level(&state, &"zzz".into(), "X").is_err());
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let state = AppState::default();
        assert!(reorder_levels(&state, vec!["level2".into(), "level1".into()]).is_ok());
        assert_eq!(
            reorder_levels(&state, vec!["level2".into()]),
            Err(PolicyError::InvalidOrder)
        );
        assert_eq!(
            reorder_levels(&state, vec!["level2".into(), "level2".into()]),
            Err(PolicyError::InvalidOrder)
        );
    }

    #[test]
    fn test_remove_word_checks_level() {
        let state = AppState::default();
        assert!(remove_word(&state, &"level1".into(), "the").is_ok());
        assert!(remove_word(&state, &"missing".into(), "the").is_err());
    }
}
