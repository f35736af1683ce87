//! Reconciliation of source files against the store.
//!
//! The synchronizer turns "this path changed" into store mutations: it
//! resolves table names over the files currently on disk, skips paths whose
//! table is already current, parses and loads the rest, and drops the tables
//! of paths that disappeared. After every reconciliation it re-materializes
//! siblings whose name changed because a conflict appeared or went away.
//!
//! A file whose name is still held by a sibling that is about to move gets
//! the sibling moved first. If that is not possible yet (the sibling is busy),
//! the file waits in a deferred set and is retried after later
//! reconciliations.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::events::SyncEvent;
use super::parser::parse_file;
use super::scanner::scan_directory;
use super::stats::WatcherStats;
use crate::observability::spans;
use crate::resolver::{ensure_unique, find_collisions, resolve, NameMap};
use crate::storage::{LoadSummary, ModStamp, Store};
use crate::{Error, Result};

/// Outcome of the initial scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Delimited files found on disk.
    pub files: usize,
    /// Files parsed and loaded.
    pub loaded: usize,
    /// Files whose table was already current.
    pub unchanged: usize,
    /// Files that failed to parse, resolve or load.
    pub failed: usize,
    /// Tables dropped because their source is gone.
    pub pruned: usize,
}

/// What a single reconciliation did to its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// The table was (re)loaded.
    Loaded(LoadSummary),
    /// The table was already current.
    Unchanged,
    /// The source is gone; these tables were dropped.
    Removed(Vec<String>),
}

/// Exclusive right to reconcile one path. Released on drop.
#[derive(Debug)]
pub struct PathClaim {
    path: PathBuf,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
}

impl PathClaim {
    /// The claimed path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.path);
    }
}

/// Applies filesystem state to a [`Store`].
#[derive(Debug)]
pub struct Synchronizer {
    root: PathBuf,
    store: Arc<Store>,
    events: Option<mpsc::UnboundedSender<SyncEvent>>,
    stats: Arc<WatcherStats>,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    deferred: Mutex<BTreeSet<PathBuf>>,
}

impl Synchronizer {
    /// Create a synchronizer for the tree under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, store: Arc<Store>) -> Self {
        Self {
            root: root.into(),
            store,
            events: None,
            stats: WatcherStats::new(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            deferred: Mutex::new(BTreeSet::new()),
        }
    }

    /// Publish a [`SyncEvent`] on `tx` after every committed change.
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SyncEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Watched root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The store being synchronized.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> Arc<WatcherStats> {
        Arc::clone(&self.stats)
    }

    /// Claim `path` for reconciliation, or `None` if it is already in flight.
    #[must_use]
    pub fn try_claim(&self, path: &Path) -> Option<PathClaim> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(path.to_path_buf()) {
            return None;
        }
        Some(PathClaim {
            path: path.to_path_buf(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Bring the store in line with the tree before watching starts.
    ///
    /// Tables of vanished files are dropped first; then every file whose
    /// table is missing, renamed or stale is loaded. Per-file failures are
    /// logged as warnings and do not stop the scan. No events are published.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root cannot be walked or the store index
    /// cannot be read.
    pub fn initial_scan(&self) -> Result<ScanSummary> {
        let pruned = self.store.prune_missing()?;
        let report = scan_directory(&self.root)?;
        let names = resolve(&report.files, &self.root);

        for (name, paths) in find_collisions(&names) {
            tracing::warn!(table = %name, files = paths.len(), "Table name claimed by several files");
        }

        let mut summary = ScanSummary {
            files: report.files.len(),
            pruned: pruned.len(),
            ..ScanSummary::default()
        };

        let mut failures = Vec::new();
        for path in &report.files {
            match self.load_resolving(path, &names, false, &mut HashSet::new()) {
                Ok(Some(loaded)) => {
                    summary.loaded += 1;
                    tracing::debug!(table = %loaded.table_name, rows = loaded.rows, "Loaded table");
                }
                Ok(None) => summary.unchanged += 1,
                Err(e) => failures.push((path.clone(), e)),
            }
        }

        // A name refused early in the pass may have been freed later in it.
        let mut progress = true;
        while progress && !failures.is_empty() {
            progress = false;
            let mut remaining = Vec::new();
            for (path, err) in failures {
                if err.conflicting_owner().is_none() {
                    remaining.push((path, err));
                    continue;
                }
                match self.load_resolving(&path, &names, false, &mut HashSet::new()) {
                    Ok(outcome) => {
                        progress = true;
                        if outcome.is_some() {
                            summary.loaded += 1;
                        } else {
                            summary.unchanged += 1;
                        }
                    }
                    Err(e) => remaining.push((path, e)),
                }
            }
            failures = remaining;
        }

        for (path, err) in &failures {
            summary.failed += 1;
            WatcherStats::bump(&self.stats.errors);
            tracing::warn!(path = %path.display(), error = %err, "Failed to load file");
        }

        tracing::info!(
            root = %self.root.display(),
            files = summary.files,
            loaded = summary.loaded,
            unchanged = summary.unchanged,
            failed = summary.failed,
            pruned = summary.pruned,
            "Initial scan complete"
        );

        Ok(summary)
    }

    /// Reconcile one path whose writes have settled.
    ///
    /// Errors are logged and counted; the path stays stale until its next
    /// change.
    pub fn reconcile(&self, claim: &PathClaim) {
        let path = claim.path();
        let _span = spans::reconcile_span(path).entered();
        WatcherStats::bump(&self.stats.reconciliations);

        let names = match self.resolve_tree() {
            Ok(names) => names,
            Err(e) => {
                WatcherStats::bump(&self.stats.errors);
                tracing::error!(error = %e, "Failed to resolve table names");
                return;
            }
        };

        match self.reconcile_path(path, &names) {
            Ok(Reconciled::Loaded(summary)) => {
                tracing::info!(
                    table = %summary.table_name,
                    columns = summary.columns,
                    rows = summary.rows,
                    "Updated table"
                );
            }
            Ok(Reconciled::Unchanged) => {
                tracing::debug!("Table already current");
            }
            Ok(Reconciled::Removed(tables)) => {
                for table in &tables {
                    tracing::info!(table = %table, "Removed table");
                }
            }
            Err(e) => {
                WatcherStats::bump(&self.stats.errors);
                tracing::error!(error = %e, "Reconciliation failed");
            }
        }

        self.realign(&names, path);
    }

    /// Reconcile `path` against an already resolved name map.
    ///
    /// # Errors
    ///
    /// Returns parse, conflict and store errors for an existing path, store
    /// errors for a missing one.
    pub fn reconcile_path(&self, path: &Path, names: &NameMap) -> Result<Reconciled> {
        if path.exists() {
            let mut visited = HashSet::new();
            return Ok(match self.load_resolving(path, names, true, &mut visited)? {
                Some(summary) => Reconciled::Loaded(summary),
                None => Reconciled::Unchanged,
            });
        }

        self.deferred.lock().remove(path);
        let removed = self.store.remove_path(path)?;
        for table in &removed {
            WatcherStats::bump(&self.stats.removals);
            self.publish(SyncEvent::delete(path, table.as_str()));
        }
        Ok(Reconciled::Removed(removed))
    }

    /// Resolve names over every delimited file currently on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be walked.
    pub fn resolve_tree(&self) -> Result<NameMap> {
        let report = scan_directory(&self.root)?;
        Ok(resolve(&report.files, &self.root))
    }

    /// Paths waiting for their table name to be released.
    #[must_use]
    pub fn deferred(&self) -> Vec<PathBuf> {
        self.deferred.lock().iter().cloned().collect()
    }

    /// Load `path`, first moving aside a sibling that still holds the name
    /// but now resolves to another one.
    ///
    /// A path refused because of a live holder is deferred; any other
    /// outcome clears it from the deferred set. `visited` bounds chains of
    /// moves and breaks cycles.
    fn load_resolving(
        &self,
        path: &Path,
        names: &NameMap,
        publish: bool,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<Option<LoadSummary>> {
        visited.insert(path.to_path_buf());
        loop {
            let err = match self.sync_existing(path, names, publish) {
                Ok(outcome) => {
                    self.deferred.lock().remove(path);
                    return Ok(outcome);
                }
                Err(e) => e,
            };

            let Some(holder) = err.conflicting_owner().map(PathBuf::from) else {
                self.deferred.lock().remove(path);
                return Err(err);
            };
            if !self.move_aside(&holder, names, publish, visited) {
                self.deferred.lock().insert(path.to_path_buf());
                return Err(err);
            }
        }
    }

    /// Reload `holder` under its own resolved name so it releases the one it
    /// holds. False if it cannot be moved right now.
    fn move_aside(
        &self,
        holder: &Path,
        names: &NameMap,
        publish: bool,
        visited: &mut HashSet<PathBuf>,
    ) -> bool {
        if visited.contains(holder) || !names.contains_key(holder) {
            return false;
        }
        let Some(_claim) = self.try_claim(holder) else {
            tracing::debug!(path = %holder.display(), "Name holder busy");
            return false;
        };

        match self.load_resolving(holder, names, publish, visited) {
            Ok(_) => {
                tracing::debug!(path = %holder.display(), "Moved table to release its name");
                true
            }
            Err(e) => {
                tracing::debug!(path = %holder.display(), error = %e, "Name holder could not move");
                false
            }
        }
    }

    /// Load `path` under its resolved name unless that table is current.
    fn sync_existing(
        &self,
        path: &Path,
        names: &NameMap,
        publish: bool,
    ) -> Result<Option<LoadSummary>> {
        ensure_unique(names, path)?;
        let table = names.get(path).ok_or_else(|| {
            Error::internal(format!("no table name resolved for '{}'", path.display()))
        })?;

        let stamp = ModStamp::of_file(path)?;
        if self.is_current(path, table, stamp)? {
            WatcherStats::bump(&self.stats.skipped);
            return Ok(None);
        }

        let parsed = parse_file(path, table.as_str())?;
        let summary = self.store.load(&parsed.record, parsed.rows)?;
        WatcherStats::bump(&self.stats.loads);

        if publish {
            self.publish(SyncEvent::update(path, summary.table_name.as_str()));
        }
        Ok(Some(summary))
    }

    /// A table is current when it is recorded for this path at this stamp.
    fn is_current(&self, path: &Path, table: &str, stamp: ModStamp) -> Result<bool> {
        if self.store.needs_update(table, stamp) {
            return Ok(false);
        }
        Ok(self.store.table_for_path(path)?.as_deref() == Some(table))
    }

    /// Reload tracked siblings whose resolved name no longer matches.
    fn realign(&self, names: &NameMap, origin: &Path) {
        let mappings = match self.store.mappings() {
            Ok(mappings) => mappings,
            Err(e) => {
                WatcherStats::bump(&self.stats.errors);
                tracing::error!(error = %e, "Failed to read table mappings");
                return;
            }
        };

        for (path, stored) in mappings {
            if path == origin {
                continue;
            }
            let Some(resolved) = names.get(&path) else {
                continue;
            };
            if *resolved == stored || ensure_unique(names, &path).is_err() {
                continue;
            }
            let Some(_claim) = self.try_claim(&path) else {
                tracing::debug!(path = %path.display(), "Sibling busy, skipping rename");
                continue;
            };

            match self.load_resolving(&path, names, true, &mut HashSet::new()) {
                Ok(_) => {
                    tracing::info!(
                        path = %path.display(),
                        from = %stored,
                        to = %resolved,
                        "Renamed table after name change"
                    );
                }
                Err(e) => {
                    WatcherStats::bump(&self.stats.errors);
                    tracing::error!(path = %path.display(), error = %e, "Failed to rename table");
                }
            }
        }

        let waiting: Vec<PathBuf> = self
            .deferred
            .lock()
            .iter()
            .filter(|path| path.as_path() != origin)
            .cloned()
            .collect();
        for path in waiting {
            if !names.contains_key(&path) {
                self.deferred.lock().remove(&path);
                continue;
            }
            let Some(_claim) = self.try_claim(&path) else {
                continue;
            };
            match self.load_resolving(&path, names, true, &mut HashSet::new()) {
                Ok(_) => tracing::info!(path = %path.display(), "Loaded table once its name was free"),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "Still waiting for table name"),
            }
        }
    }

    fn publish(&self, event: SyncEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                tracing::trace!("Event receiver dropped");
            }
        }
    }
}
