//! Environment-driven configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `WORDPLAY_BIND` | `0.0.0.0:5000` |
//! | `WORDPLAY_DATA_PATH` | `./data/wordplay.sled` |
//! | `WORDPLAY_REMOTE_URL` | unset |
//! | `WORDPLAY_SYNC_DEBOUNCE_MS` | `500` |
//! | `WORDPLAY_SYNC_MIN_VISIBLE_MS` | `1000` |

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::storage::StorageConfig;
use crate::sync::SyncConfig;

pub const ENV_BIND: &str = "WORDPLAY_BIND";
pub const ENV_DATA_PATH: &str = "WORDPLAY_DATA_PATH";
pub const ENV_REMOTE_URL: &str = "WORDPLAY_REMOTE_URL";
pub const ENV_SYNC_DEBOUNCE_MS: &str = "WORDPLAY_SYNC_DEBOUNCE_MS";
pub const ENV_SYNC_MIN_VISIBLE_MS: &str = "WORDPLAY_SYNC_MIN_VISIBLE_MS";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} is not set")]
    Missing(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address `wordplay-server` listens on
    pub bind: SocketAddr,
    pub storage: StorageConfig,
    /// Base URL of a hosted document store, for clients
    pub remote_url: Option<String>,
    pub sync: SyncConfig,
}

impl Config {
    /// Read the process environment, after loading `.env` if present
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = parse_or(&lookup, ENV_BIND, SocketAddr::from(([0, 0, 0, 0], 5000)))?;

        let storage = match lookup(ENV_DATA_PATH) {
            Some(path) if path.trim().is_empty() => return Err(ConfigError::Empty(ENV_DATA_PATH)),
            Some(path) => StorageConfig::new(path),
            None => StorageConfig::default(),
        };

        let remote_url = lookup(ENV_REMOTE_URL).filter(|url| !url.trim().is_empty());

        let defaults = SyncConfig::default();
        let sync = SyncConfig::default()
            .with_debounce(Duration::from_millis(parse_or(
                &lookup,
                ENV_SYNC_DEBOUNCE_MS,
                defaults.debounce.as_millis() as u64,
            )?))
            .with_min_visible(Duration::from_millis(parse_or(
                &lookup,
                ENV_SYNC_MIN_VISIBLE_MS,
                defaults.min_visible.as_millis() as u64,
            )?));

        Ok(Self {
            bind,
            storage,
            remote_url,
            sync,
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> ConfigResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(default),
    }
}
