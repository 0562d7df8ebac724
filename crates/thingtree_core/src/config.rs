//! Store and logging configuration.
//!
//! # Responsibility
//! - Describe where the store lives and how core logging is set up.
//! - Load settings from an optional TOML file, then environment overrides.
//!
//! # Precedence
//! 1. Defaults (in-memory store, build-mode log level, no file logging)
//! 2. TOML file
//! 3. `THINGTREE_DB_PATH`, `THINGTREE_LOG_LEVEL`, `THINGTREE_LOG_DIR`
//!
//! # Example
//! ```toml
//! db_path = "/var/lib/thingtree/things.sqlite3"
//! log_level = "info"
//! log_dir = "/var/log/thingtree"
//! ```

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::{default_log_level, init_logging, LoggingError};
use rusqlite::Connection;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "THINGTREE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "THINGTREE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "THINGTREE_LOG_DIR";

/// Errors from configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config file `{}`: {source}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "failed to parse config file `{}`: {message}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { .. } => None,
        }
    }
}

/// Resolved settings for one process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite file; `None` opens an in-memory store.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute directory for rolling logs; `None` leaves logging off.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Loads defaults, the optional file, then process environment overrides.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|err| err.to_string())
    }

    /// Applies overrides from `lookup`; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(value) = read(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read(ENV_LOG_LEVEL) {
            self.log_level = value;
        }
        if let Some(value) = read(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(value));
        }
    }

    /// Starts file logging when `log_dir` is set.
    pub fn init_logging(&self) -> Result<(), LoggingError> {
        match &self.log_dir {
            Some(dir) => init_logging(&self.log_level, dir),
            None => Ok(()),
        }
    }

    /// Opens the configured store with migrations applied.
    pub fn open_store(&self) -> DbResult<Connection> {
        match &self.db_path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreConfig, ENV_DB_PATH, ENV_LOG_LEVEL};
    use std::path::PathBuf;

    #[test]
    fn toml_fields_override_defaults() {
        let config = StoreConfig::from_toml_str(
            r#"
            db_path = "/tmp/things.sqlite3"
            log_level = "warn"
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/things.sqlite3")));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn unknown_toml_keys_are_rejected() {
        let err = StoreConfig::from_toml_str("postgres_host = \"db\"").unwrap_err();
        assert!(err.contains("postgres_host"));
    }

    #[test]
    fn env_overrides_win_and_blank_values_are_ignored() {
        let mut config = StoreConfig::default();
        config.apply_env(|key| match key {
            ENV_DB_PATH => Some("/data/things.sqlite3".to_string()),
            ENV_LOG_LEVEL => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.db_path, Some(PathBuf::from("/data/things.sqlite3")));
        assert_eq!(config.log_level, StoreConfig::default().log_level);
    }

    #[test]
    fn default_config_opens_in_memory_store_without_logging() {
        let config = StoreConfig::default();
        config.init_logging().unwrap();
        let conn = config.open_store().unwrap();
        let version: u32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, crate::db::migrations::latest_version());
    }
}
