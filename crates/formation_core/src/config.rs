//! Runtime configuration resolved from the environment.
//!
//! # Responsibility
//! - Resolve the database location and logging settings once.
//! - Keep variable names and defaults in one place for every binary.
//!
//! # Invariants
//! - Blank environment values count as unset.
//! - Resolution never fails; invalid log levels are reported by
//!   [`init_logging`](crate::logging::init_logging).

use crate::logging::{default_log_level, LogDestination, LoggingSettings};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "FORMATION_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "FORMATION_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "FORMATION_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "formation.sqlite3";

/// Settings shared by every entry point of the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// SQLite file backing the document store.
    pub db_path: PathBuf,
    pub logging: LoggingSettings,
}

impl CoreConfig {
    /// Resolves configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|trimmed| !trimmed.is_empty())
        };

        let db_path = value(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));
        let level = value(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string());
        let destination = match value(LOG_DIR_ENV) {
            Some(dir) => LogDestination::Directory(PathBuf::from(dir)),
            None => LogDestination::Stderr,
        };

        Self {
            db_path,
            logging: LoggingSettings { level, destination },
        }
    }
}
