//! File system watcher using notify-rs.
//!
//! One background task owns the notify handle and the debounce set. It waits
//! on three things at once: the stop signal, the next raw notification, and
//! the sweep tick. Ripe paths are reconciled on the blocking pool, tracked so
//! that [`FileWatcher::stop`] can wait for them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::debounce::Debouncer;
use super::filter::is_delimited_file;
use super::scanner::{list_directories, scan_directory};
use super::stats::{WatcherStats, WatcherStatsSnapshot};
use super::synchronizer::Synchronizer;
use crate::config::{DEFAULT_QUIET_WINDOW, DEFAULT_SWEEP_INTERVAL};
use crate::error::WatcherError;
use crate::{Error, Result};

type RawEvent = notify::Result<Event>;

/// File watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Root of the watched tree.
    pub root: PathBuf,
    /// Period of the debounce sweep.
    pub sweep_interval: Duration,
    /// Silence required before a path is reconciled.
    pub quiet_window: Duration,
}

impl WatcherConfig {
    /// Default timings for the tree under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            quiet_window: DEFAULT_QUIET_WINDOW,
        }
    }
}

/// Watches a directory tree and keeps a store synchronized with it.
pub struct FileWatcher {
    cancel: CancellationToken,
    tracker: TaskTracker,
    sweep: Option<JoinHandle<RecommendedWatcher>>,
    watched_dirs: Arc<Mutex<Vec<PathBuf>>>,
    stats: Arc<WatcherStats>,
}

impl FileWatcher {
    /// Watch every directory under `config.root` and start the sweep loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::WatchFailed`] if any directory cannot be
    /// watched, or a configuration error outside a runtime.
    pub fn start(config: &WatcherConfig, sync: Arc<Synchronizer>) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::config("watching requires a running tokio runtime"))?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |result: RawEvent| {
            let _ = raw_tx.send(result);
        })
        .map_err(|e| watch_failed(&config.root, &e))?;

        let mut dirs = Vec::new();
        for dir in list_directories(&config.root)? {
            watcher
                .watch(&dir, RecursiveMode::NonRecursive)
                .map_err(|e| watch_failed(&dir, &e))?;
            dirs.push(dir);
        }

        tracing::info!(
            path = %config.root.display(),
            directories = dirs.len(),
            "Watching directory tree"
        );

        let watched_dirs = Arc::new(Mutex::new(dirs));
        let stats = sync.stats();
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        let state = SweepLoop {
            watcher,
            watched_dirs: Arc::clone(&watched_dirs),
            debouncer: Debouncer::new(config.quiet_window),
            sync,
            tracker: tracker.clone(),
            stats: Arc::clone(&stats),
        };
        let sweep = runtime.spawn(state.run(raw_rx, cancel.clone(), config.sweep_interval));

        Ok(Self {
            cancel,
            tracker,
            sweep: Some(sweep),
            watched_dirs,
            stats,
        })
    }

    /// Stop watching.
    ///
    /// Ends the sweep loop, waits for every dispatched reconciliation to
    /// finish, then releases the notify handle. Pending paths that never
    /// ripened are discarded. Calling this twice is harmless.
    pub async fn stop(&mut self) -> WatcherStatsSnapshot {
        self.cancel.cancel();

        let watcher = match self.sweep.take() {
            Some(handle) => match handle.await {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::error!(error = %e, "Sweep loop panicked");
                    None
                }
            },
            None => None,
        };

        self.tracker.close();
        self.tracker.wait().await;
        drop(watcher);

        let snapshot = self.stats.snapshot();
        tracing::info!(
            events = snapshot.events_seen,
            reconciliations = snapshot.reconciliations,
            loads = snapshot.loads,
            removals = snapshot.removals,
            errors = snapshot.errors,
            "Watcher stopped"
        );
        snapshot
    }

    /// True until [`stop`](Self::stop) has run.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sweep.is_some()
    }

    /// Get list of watched directories.
    #[must_use]
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.watched_dirs.lock().clone()
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> Arc<WatcherStats> {
        Arc::clone(&self.stats)
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("running", &self.is_running())
            .field("watched_dirs", &self.watched_dirs.lock().len())
            .finish_non_exhaustive()
    }
}

/// State owned by the sweep task.
struct SweepLoop {
    watcher: RecommendedWatcher,
    watched_dirs: Arc<Mutex<Vec<PathBuf>>>,
    debouncer: Debouncer,
    sync: Arc<Synchronizer>,
    tracker: TaskTracker,
    stats: Arc<WatcherStats>,
}

impl SweepLoop {
    async fn run(
        mut self,
        mut raw_rx: mpsc::UnboundedReceiver<RawEvent>,
        cancel: CancellationToken,
        sweep_interval: Duration,
    ) -> RecommendedWatcher {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                Some(result) = raw_rx.recv() => self.intake(result),
                _ = ticker.tick() => self.sweep(),
            }
        }

        tracing::debug!(pending = self.debouncer.len(), "Sweep loop exited");
        self.watcher
    }

    fn intake(&mut self, result: RawEvent) {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "Watch error");
                return;
            }
        };

        if matches!(event.kind, EventKind::Access(_)) {
            return;
        }

        let now = Instant::now();
        let renamed = matches!(event.kind, EventKind::Modify(ModifyKind::Name(_)));
        let appeared = renamed || matches!(event.kind, EventKind::Create(_));
        let vanished = renamed || matches!(event.kind, EventKind::Remove(_));

        for path in event.paths {
            if appeared && path.is_dir() {
                self.add_directory(&path);
            } else if is_delimited_file(&path) {
                WatcherStats::bump(&self.stats.events_seen);
                tracing::trace!(path = %path.display(), kind = ?event.kind, "File event");
                self.debouncer.record(path, now);
            } else if vanished && !path.exists() {
                self.forget_directory(&path, now);
            }
        }
    }

    /// A directory left the tree: stop tracking it and queue every source
    /// recorded under it, so their tables are dropped.
    fn forget_directory(&mut self, dir: &Path, now: Instant) {
        let was_watched = {
            let mut watched_dirs = self.watched_dirs.lock();
            let before = watched_dirs.len();
            watched_dirs.retain(|watched| !watched.starts_with(dir));
            watched_dirs.len() != before
        };
        if !was_watched {
            return;
        }

        let mappings = match self.sync.store().mappings() {
            Ok(mappings) => mappings,
            Err(e) => {
                tracing::error!(path = %dir.display(), error = %e, "Failed to read table mappings");
                return;
            }
        };

        let mut queued = 0;
        for source in mappings.into_keys().filter(|source| source.starts_with(dir)) {
            self.debouncer.record(source, now);
            queued += 1;
        }
        if queued > 0 {
            WatcherStats::bump(&self.stats.events_seen);
            tracing::debug!(path = %dir.display(), sources = queued, "Directory left the tree");
        }
    }

    /// Fold a new directory (and anything already inside it) into the watch.
    fn add_directory(&mut self, dir: &Path) {
        let dirs = match list_directories(dir) {
            Ok(dirs) => dirs,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Failed to list new directory");
                return;
            }
        };

        for sub in dirs {
            if self.watched_dirs.lock().contains(&sub) {
                continue;
            }
            match self.watcher.watch(&sub, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    tracing::debug!(path = %sub.display(), "Watching new directory");
                    self.watched_dirs.lock().push(sub);
                }
                Err(e) => {
                    tracing::warn!(path = %sub.display(), error = %e, "Failed to watch new directory");
                }
            }
        }

        // Files may land before the watch does.
        match scan_directory(dir) {
            Ok(report) => {
                let now = Instant::now();
                for file in report.files {
                    self.debouncer.record(file, now);
                }
            }
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Failed to scan new directory");
            }
        }
    }

    fn sweep(&mut self) {
        for event in self.debouncer.take_quiet(Instant::now()) {
            match self.sync.try_claim(&event.path) {
                Some(claim) => {
                    let sync = Arc::clone(&self.sync);
                    self.tracker.spawn_blocking(move || sync.reconcile(&claim));
                }
                None => {
                    WatcherStats::bump(&self.stats.requeued);
                    tracing::debug!(path = %event.path.display(), "Path in flight, requeued");
                    self.debouncer.requeue(event);
                }
            }
        }
    }
}

fn watch_failed(path: &Path, err: &notify::Error) -> Error {
    WatcherError::WatchFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use std::fs;
    use tempfile::TempDir;

    fn sync_for(root: &Path) -> Arc<Synchronizer> {
        let store = Arc::new(Store::open_in_memory().unwrap());
        Arc::new(Synchronizer::new(root, store))
    }

    #[test]
    fn test_watcher_config_defaults() {
        let config = WatcherConfig::new("/data");
        assert_eq!(config.root, PathBuf::from("/data"));
        assert_eq!(config.sweep_interval, DEFAULT_SWEEP_INTERVAL);
        assert_eq!(config.quiet_window, DEFAULT_QUIET_WINDOW);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let tmp = TempDir::new().unwrap();
        let err = FileWatcher::start(&WatcherConfig::new(tmp.path()), sync_for(tmp.path()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_start_missing_root_fails() {
        let root = Path::new("/nonexistent/watch/root");
        let err = FileWatcher::start(&WatcherConfig::new(root), sync_for(root)).unwrap_err();
        assert!(matches!(err, Error::Watcher(WatcherError::WatchFailed { .. })));
    }

    #[tokio::test]
    async fn test_watches_every_directory() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a").join("b")).unwrap();

        let mut watcher =
            FileWatcher::start(&WatcherConfig::new(tmp.path()), sync_for(tmp.path())).unwrap();
        assert_eq!(watcher.watched_dirs().len(), 3);
        assert!(watcher.is_running());

        watcher.stop().await;
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn test_stop_with_nothing_pending_returns_promptly() {
        let tmp = TempDir::new().unwrap();
        let mut watcher =
            FileWatcher::start(&WatcherConfig::new(tmp.path()), sync_for(tmp.path())).unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(5), watcher.stop())
            .await
            .unwrap();
        assert_eq!(snapshot.reconciliations, 0);

        // Second stop is a no-op.
        tokio::time::timeout(Duration::from_secs(5), watcher.stop())
            .await
            .unwrap();
    }
}
