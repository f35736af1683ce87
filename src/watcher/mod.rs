//! Change detection and synchronization.
//!
//! This module provides:
//! - Directory watching using notify-rs, one watch per directory
//! - Per-path debouncing of raw notifications
//! - Reconciliation of settled paths against the store
//! - Typed change events published after each commit

mod debounce;
mod events;
mod filter;
mod parser;
mod scanner;
mod stats;
mod synchronizer;
#[allow(clippy::module_inception)]
mod watcher;

pub use debounce::{Debouncer, PendingEvent};
pub use events::{ChangeKind, SyncEvent};
pub use filter::{delimiter_for, is_delimited_file};
pub use parser::{parse_file, ParsedFile};
pub use scanner::{list_directories, scan_directory, ScanReport};
pub use stats::{WatcherStats, WatcherStatsSnapshot};
pub use synchronizer::{PathClaim, Reconciled, ScanSummary, Synchronizer};
pub use watcher::{FileWatcher, WatcherConfig};
