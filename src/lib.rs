//! csvql
//!
//! Keeps a `SQLite` database synchronized with a directory tree of CSV and
//! TSV files. Every file becomes a table; edits, deletions and naming
//! conflicts are picked up while queries keep running.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod config;
pub mod error;
pub mod observability;
pub mod resolver;
pub mod storage;
pub mod watcher;

pub use app::App;
pub use config::Config;
pub use error::{Error, Result};
pub use storage::{QueryResult, Store};
pub use watcher::{ChangeKind, SyncEvent};
