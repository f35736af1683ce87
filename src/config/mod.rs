//! Configuration management for csvql.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables (`CSVQL_*`)
//! - Built-in defaults

mod settings;

pub use settings::{Config, DEFAULT_DB_FILE, DEFAULT_QUIET_WINDOW, DEFAULT_SWEEP_INTERVAL};
