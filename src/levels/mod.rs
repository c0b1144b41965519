//! Word and level data model.
//!
//! Levels live in a keyed collection whose iteration order carries no meaning;
//! presentation order is kept separately in a [`LevelOrder`]. Words are stored
//! lowercase, casing for display is derived at render time.

pub mod game;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Milliseconds since the Unix epoch
pub type Millis = i64;

/// Opaque identifier of a level, never shown to users
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelKey(String);

impl LevelKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Time-based key, e.g. `level_1700000000000`
    pub fn generate(now: Millis) -> Self {
        Self(format!("level_{}", now))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LevelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LevelKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// A named, ordered collection of words presented together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub name: String,
    #[serde(default)]
    pub words: Vec<String>,
}

impl Level {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            words: Vec::new(),
        }
    }

    pub fn with_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.words = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }
}

/// Level key -> level
pub type Levels = BTreeMap<LevelKey, Level>;

/// Presentation order of level keys
pub type LevelOrder = Vec<LevelKey>;

/// The part of the application state that is synchronized with the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSnapshot {
    pub levels: Levels,
    pub level_order: LevelOrder,
    pub last_modified: Millis,
}

impl LevelSnapshot {
    pub fn new(levels: Levels, level_order: LevelOrder, last_modified: Millis) -> Self {
        Self {
            levels,
            level_order,
            last_modified,
        }
    }

    /// Content view used for change detection; ignores the timestamp
    pub fn content(&self) -> LevelContent {
        LevelContent {
            levels: self.levels.clone(),
            level_order: self.level_order.clone(),
        }
    }
}

/// Levels plus their order, compared structurally to detect content edits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelContent {
    pub levels: Levels,
    pub level_order: LevelOrder,
}

impl LevelContent {
    pub fn new(levels: &Levels, level_order: &[LevelKey]) -> Self {
        Self {
            levels: levels.clone(),
            level_order: level_order.to_vec(),
        }
    }
}

/// Built-in levels for a fresh install
pub fn default_levels() -> (Levels, LevelOrder) {
    let mut levels = Levels::new();
    levels.insert(
        LevelKey::new("level1"),
        Level::new("Level 1").with_words(["i", "a", "the", "and", "see", "go", "to", "is"]),
    );
    levels.insert(
        LevelKey::new("level2"),
        Level::new("Level 2").with_words(["cat", "dog", "sun", "run", "big", "red", "my", "can"]),
    );
    let order = vec![LevelKey::new("level1"), LevelKey::new("level2")];
    (levels, order)
}

/// Order derived from the collection itself, used when no explicit order exists
pub fn derive_level_order(levels: &Levels) -> LevelOrder {
    levels.keys().cloned().collect()
}

/// Keys of `order` that still exist in `levels`, in presentation order
pub fn sorted_level_keys(levels: &Levels, order: &[LevelKey]) -> Vec<LevelKey> {
    order
        .iter()
        .filter(|key| levels.contains_key(*key))
        .cloned()
        .collect()
}

pub fn first_level_key(levels: &Levels, order: &[LevelKey]) -> Option<LevelKey> {
    order.iter().find(|key| levels.contains_key(*key)).cloned()
}

pub fn sorted_level_keys_excluding(
    levels: &Levels,
    order: &[LevelKey],
    excluded: &LevelKey,
) -> Vec<LevelKey> {
    order
        .iter()
        .filter(|key| *key != excluded && levels.contains_key(*key))
        .cloned()
        .collect()
}

/// Level to select after `removed` is deleted
pub fn next_selection_after_removal(
    levels: &Levels,
    order: &[LevelKey],
    removed: &LevelKey,
) -> Option<LevelKey> {
    sorted_level_keys_excluding(levels, order, removed)
        .into_iter()
        .next()
}

/// Every word of every level in presentation order ("all levels" selection)
pub fn all_words(levels: &Levels, order: &[LevelKey]) -> Vec<String> {
    sorted_level_keys(levels, order)
        .iter()
        .filter_map(|key| levels.get(key))
        .flat_map(|level| level.words.iter().cloned())
        .collect()
}
