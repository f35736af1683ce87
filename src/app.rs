//! Application facade.
//!
//! Opens the store, brings it in line with the directory tree, and, when
//! asked to, keeps it synchronized until closed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::signal;
use tokio::sync::mpsc;

use crate::storage::{QueryResult, Store};
use crate::watcher::{FileWatcher, ScanSummary, SyncEvent, Synchronizer, WatcherConfig};
use crate::{Config, Result};

/// A synchronized, queryable view of a directory of CSV/TSV files.
#[derive(Debug)]
pub struct App {
    root: PathBuf,
    db_path: PathBuf,
    store: Arc<Store>,
    scan: ScanSummary,
    watcher: Option<FileWatcher>,
}

impl App {
    /// Open the store for `config.root_dir`, load it, and start watching if
    /// `config.watch` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the store cannot be
    /// opened, the tree cannot be scanned or watched, or watching is
    /// requested outside a tokio runtime.
    pub fn open(config: &Config) -> Result<Self> {
        Self::start(config, None)
    }

    /// Like [`open`](Self::open), also returning a stream of committed
    /// changes. The initial load publishes nothing.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with_events(config: &Config) -> Result<(Self, mpsc::UnboundedReceiver<SyncEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Self::start(config, Some(tx))?;
        Ok((app, rx))
    }

    fn start(config: &Config, events: Option<mpsc::UnboundedSender<SyncEvent>>) -> Result<Self> {
        config.validate()?;

        let root = config.root_dir.canonicalize()?;
        let db_path = Config {
            root_dir: root.clone(),
            ..config.clone()
        }
        .database_path();

        let store = Arc::new(Store::open(&db_path)?);

        let mut sync = Synchronizer::new(&root, Arc::clone(&store));
        if let Some(tx) = events {
            sync = sync.with_events(tx);
        }
        let sync = Arc::new(sync);

        let scan = sync.initial_scan()?;

        let watcher = if config.watch {
            let watcher_config = WatcherConfig {
                root: root.clone(),
                sweep_interval: config.sweep_interval,
                quiet_window: config.quiet_window,
            };
            Some(FileWatcher::start(&watcher_config, sync)?)
        } else {
            None
        };

        tracing::info!(
            root = %root.display(),
            db = %db_path.display(),
            tables = scan.loaded + scan.unchanged,
            watching = watcher.is_some(),
            "csvql ready"
        );

        Ok(Self {
            root,
            db_path,
            store,
            scan,
            watcher,
        })
    }

    /// Canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the backing database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// What the initial load did.
    #[must_use]
    pub const fn scan_summary(&self) -> &ScanSummary {
        &self.scan
    }

    /// True while a watcher is running.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watcher.as_ref().is_some_and(FileWatcher::is_running)
    }

    /// Run a read-only statement against the store.
    ///
    /// # Errors
    ///
    /// Returns an error for a statement that would write, a not-found error
    /// for a missing table, or the engine's error.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        self.store.query(sql)
    }

    /// Sorted names of all loaded tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        self.store.list_tables()
    }

    /// Column names of a table.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the table does not exist.
    pub fn table_info(&self, table: &str) -> Result<Vec<String>> {
        self.store.table_info(table)
    }

    /// Stop watching, waiting for in-flight reconciliations, and release
    /// the store.
    pub async fn close(mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop().await;
        }
        tracing::debug!(db = %self.db_path.display(), "Store closed");
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
///
/// # Errors
///
/// Returns an error if no signal handler can be installed.
pub async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                tracing::info!("Received Ctrl+C, shutting down");
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}
