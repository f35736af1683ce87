//! Error types and Result aliases for csvql.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using csvql's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for csvql operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Source file could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Database/storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Two distinct paths resolved to the same table name.
    #[error("table name '{name}' claimed by several files: {}", paths.join(", "))]
    NameConflict { name: String, paths: Vec<String> },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised while reading a delimited source file.
#[derive(Error, Debug)]
pub enum ParseError {
    /// File has no content rows, not even a header.
    #[error("file '{path}' is empty")]
    Empty { path: String },

    /// File could not be opened or stat'ed.
    #[error("failed to open '{path}': {reason}")]
    Open { path: String, reason: String },

    /// Content could not be decoded as delimited text.
    #[error("failed to decode '{path}': {reason}")]
    Decode { path: String, reason: String },
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found: {entity} '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A load or remove was rolled back.
    #[error("commit of table '{table}' failed: {reason}")]
    Commit { table: String, reason: String },

    /// Table name is already owned by another live source file.
    #[error("table '{table}' already belongs to '{owner}', refusing to load '{incoming}'")]
    NameConflict {
        table: String,
        owner: String,
        incoming: String,
    },

    /// A query would modify the database.
    #[error("only read-only statements can be queried: {0}")]
    NotReadOnly(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when the error reports a missing table or record.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound { .. }))
    }

    /// Source path of the file holding a table name that a load was refused.
    #[must_use]
    pub fn conflicting_owner(&self) -> Option<&str> {
        match self {
            Self::Storage(StorageError::NameConflict { owner, .. }) => Some(owner),
            _ => None,
        }
    }
}

impl StorageError {
    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create a commit error for the given table.
    pub fn commit(table: impl Into<String>, reason: impl ToString) -> Self {
        Self::Commit {
            table: table.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
