//! Wordplay - word-learning game core
//!
//! - `levels`: word lists, level ordering and game helpers
//! - `state`: application state, actions and the reducer
//! - `storage`: Sled-backed local persistence and hosted documents
//! - `remote`: the document store interface and its HTTP client
//! - `sync`: last-write-wins level sync and its coordinator
//! - `server`: the document service behind `wordplay-server`

pub mod config;
pub mod levels;
pub mod remote;
pub mod server;
pub mod state;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use levels::{Level, LevelKey, LevelOrder, LevelSnapshot, Levels, Millis};
pub use state::{Action, AppState, Store};
pub use sync::{SyncCoordinator, SyncEngine};
