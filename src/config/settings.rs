//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default database file name, created inside the root directory.
pub const DEFAULT_DB_FILE: &str = ".csvql.db";

/// Interval between debounce sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// How long a path must stay silent before it is reconciled.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(300);

const MAX_QUIET_WINDOW: Duration = Duration::from_secs(60);

/// Main configuration for csvql.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory tree scanned for CSV/TSV files.
    pub root_dir: PathBuf,

    /// Explicit `SQLite` database path. Defaults to `<root>/.csvql.db`.
    pub db_path: Option<PathBuf>,

    /// Keep watching the tree after the initial scan.
    pub watch: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub log_json: bool,

    /// Period of the debounce sweep.
    pub sweep_interval: Duration,

    /// Silence required before a changed path is reconciled.
    pub quiet_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            db_path: None,
            watch: true,
            log_level: "info".to_string(),
            log_json: false,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            quiet_window: DEFAULT_QUIET_WINDOW,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration rooted at `root_dir`, everything else default.
    #[must_use]
    pub fn for_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "root directory '{}' does not exist or is not a directory",
                self.root_dir.display()
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.sweep_interval.is_zero() {
            return Err(Error::config("sweep_interval cannot be 0"));
        }

        if self.quiet_window.is_zero() {
            return Err(Error::config("quiet_window cannot be 0"));
        }

        if self.quiet_window > MAX_QUIET_WINDOW {
            return Err(Error::config("quiet_window cannot exceed 60s"));
        }

        Ok(())
    }

    /// Get the path to the `SQLite` database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.root_dir.join(DEFAULT_DB_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rooted() -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        let config = Config::for_root(tmp.path());
        (tmp, config)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.root_dir, PathBuf::from("."));
        assert!(config.watch);
        assert_eq!(config.sweep_interval, Duration::from_millis(500));
        assert_eq!(config.quiet_window, Duration::from_millis(300));
    }

    #[test]
    fn test_validate_ok() {
        let (_tmp, config) = rooted();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_root() {
        let config = Config::for_root("/nonexistent/csvql/root");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("root directory"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let (_tmp, mut config) = rooted();
        config.log_level = "invalid".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let (_tmp, mut config) = rooted();
        for level in ["TRACE", "Debug", "INFO", "Warn", "ERROR"] {
            config.log_level = level.to_string();
            assert!(
                config.validate().is_ok(),
                "Level '{level}' should be valid (case insensitive)"
            );
        }
    }

    #[test]
    fn test_validate_zero_durations() {
        let (_tmp, mut config) = rooted();
        config.sweep_interval = Duration::ZERO;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("sweep_interval"));

        config.sweep_interval = DEFAULT_SWEEP_INTERVAL;
        config.quiet_window = Duration::ZERO;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("quiet_window"));
    }

    #[test]
    fn test_validate_quiet_window_too_long() {
        let (_tmp, mut config) = rooted();
        config.quiet_window = Duration::from_secs(120);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("60s"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::for_root("/srv/data");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/data/.csvql.db")
        );
    }

    #[test]
    fn test_database_path_explicit() {
        let config = Config {
            db_path: Some(PathBuf::from("/var/lib/csvql/store.db")),
            ..Config::for_root("/srv/data")
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/csvql/store.db")
        );
    }
}
