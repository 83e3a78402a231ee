//! Environment-driven runtime configuration.
//!
//! | Variable                | Default                        |
//! |-------------------------|--------------------------------|
//! | `PROJECTDESK_DB_PATH`   | `<temp dir>/projectdesk.sqlite3` |
//! | `PROJECTDESK_LOG_LEVEL` | `default_log_level()`          |
//! | `PROJECTDESK_LOG_DIR`   | unset, file logging disabled   |
//!
//! Blank values count as unset.

use crate::logging::default_log_level;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "PROJECTDESK_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "PROJECTDESK_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "PROJECTDESK_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "projectdesk.sqlite3";

/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// `None` keeps file logging off.
    pub log_dir: Option<PathBuf>,
}

impl CoreConfig {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            db_path: read(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
            log_level: read(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(LOG_DIR_ENV).map(PathBuf::from),
        }
    }
}
