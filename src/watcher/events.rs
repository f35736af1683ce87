//! Change notifications published after a store mutation commits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What happened to a source file's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// The table was created or re-materialized.
    Update,
    /// The table was removed.
    Delete,
}

impl ChangeKind {
    /// Wire label of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed change, visible to queries by the time it is received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Kind of change.
    pub kind: ChangeKind,
    /// Source file that triggered it.
    pub path: PathBuf,
    /// Table that was written or dropped.
    pub table: String,
}

impl SyncEvent {
    /// A table was loaded from `path`.
    #[must_use]
    pub fn update(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Update,
            path: path.into(),
            table: table.into(),
        }
    }

    /// The table for `path` was dropped.
    #[must_use]
    pub fn delete(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            path: path.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.path.display())
    }
}
