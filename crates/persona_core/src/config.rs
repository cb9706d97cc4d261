//! Process configuration resolved from environment variables.
//!
//! # Invariants
//! - Missing or blank variables fall back to defaults.
//! - Resolution never fails; validation happens where values are used
//!   (`init_logging`, `open_db`).

use std::path::PathBuf;

pub const ENV_LOG_LEVEL: &str = "PERSONA_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "PERSONA_LOG_DIR";
pub const ENV_DB_PATH: &str = "PERSONA_DB_PATH";

const DEFAULT_LOG_DIR_NAME: &str = "persona-logs";
const DEFAULT_DB_FILE_NAME: &str = "persona.sqlite3";
const DEFAULT_MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_LOG_FILES: usize = 5;

/// Rolling file logger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory for log files.
    pub log_dir: PathBuf,
    pub max_file_size_bytes: u64,
    pub max_files: usize,
}

impl LoggingConfig {
    pub fn new(level: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: level.into(),
            log_dir: log_dir.into(),
            max_file_size_bytes: DEFAULT_MAX_LOG_FILE_SIZE_BYTES,
            max_files: DEFAULT_MAX_LOG_FILES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(
            default_log_level(),
            std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME),
        )
    }
}

/// Core process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub logging: LoggingConfig,
    pub db_path: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
        }
    }
}

impl CoreConfig {
    /// Reads `PERSONA_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(level) = non_blank(ENV_LOG_LEVEL) {
            config.logging.level = level;
        }
        if let Some(dir) = non_blank(ENV_LOG_DIR) {
            config.logging.log_dir = PathBuf::from(dir);
        }
        if let Some(path) = non_blank(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        config
    }
}

/// Returns the default log level for current build mode.
///
/// - `debug` builds -> `debug`
/// - `release` builds -> `info`
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}
