//! Pure state transitions.
//!
//! `reduce` takes the clock reading as an argument so the same state, action
//! and time always produce the same result.

use tracing::debug;

use super::{Action, AppState, Screen};
use crate::levels::Millis;

/// Points awarded per correct answer
pub const SCORE_INCREMENT: u32 = 10;

pub fn reduce(state: &AppState, action: Action, now: Millis) -> AppState {
    let mut next = state.clone();

    match action {
        Action::LoadData(partial) => partial.merge_into(&mut next),
        Action::SetScreen(screen) => next.current_screen = Some(screen),
        Action::SetMode(mode) => next.current_mode = mode,
        Action::SetCurrentWord(word) => next.current_word = word,
        Action::SetScore(score) => next.score = score,
        Action::IncrementScore => next.score = next.score.saturating_add(SCORE_INCREMENT),
        Action::SetLevelData {
            level_name,
            word_list,
        } => {
            next.level_name = level_name;
            next.word_list = word_list;
        }
        Action::AddLevel { key, level } => {
            next.levels.insert(key.clone(), level);
            next.level_order.push(key);
            touch(&mut next, now);
        }
        Action::RemoveLevel(key) => {
            next.levels.remove(&key);
            next.level_order.retain(|k| *k != key);
            touch(&mut next, now);
        }
        Action::UpdateLevelOrder(order) => {
            next.level_order = order;
            touch(&mut next, now);
        }
        Action::UpdateLevelName { key, name } => match next.levels.get_mut(&key) {
            Some(level) => {
                level.name = name;
                touch(&mut next, now);
            }
            None => debug!("Rename ignored, unknown level {}", key),
        },
        Action::AddWord { level_key, word } => match next.levels.get_mut(&level_key) {
            Some(level) => {
                level.words.push(word);
                touch(&mut next, now);
            }
            None => debug!("Add word ignored, unknown level {}", level_key),
        },
        Action::RemoveWord { level_key, word } => match next.levels.get_mut(&level_key) {
            Some(level) => {
                level.words.retain(|w| *w != word);
                touch(&mut next, now);
            }
            None => debug!("Remove word ignored, unknown level {}", level_key),
        },
        Action::SetParentLogin(logged_in) => next.is_parent_logged_in = logged_in,
        Action::ToggleCase => next.is_uppercase = !next.is_uppercase,
        Action::ResetGame => {
            next.score = 0;
            next.current_word = None;
            next.current_mode = None;
            next.word_list.clear();
            next.level_name.clear();
            next.current_screen = Some(Screen::Welcome);
            next.is_parent_logged_in = false;
        }
        Action::SetUserId(user) => next.user_id = user,
        Action::SetSyncStatus(status) => next.sync_status = status,
        // Remote timestamps are server time, so ordering against local edits
        // is decided by the sync coordinator before dispatch.
        Action::SyncLevels(snapshot) => {
            next.levels = snapshot.levels;
            next.level_order = snapshot.level_order;
            next.last_modified = snapshot.last_modified;
        }
        Action::UpdateLastModified => touch(&mut next, now),
    }

    next
}

/// Strictly increasing even if the clock stalls or steps back
fn touch(state: &mut AppState, now: Millis) {
    state.last_modified = now.max(state.last_modified.saturating_add(1));
}
