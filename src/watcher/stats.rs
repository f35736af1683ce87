//! Counters for change detection and reconciliation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for file watching and synchronization.
#[derive(Debug, Default)]
pub struct WatcherStats {
    pub events_seen: AtomicU64,
    pub reconciliations: AtomicU64,
    pub requeued: AtomicU64,
    pub loads: AtomicU64,
    pub removals: AtomicU64,
    pub skipped: AtomicU64,
    pub errors: AtomicU64,
}

impl WatcherStats {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            events_seen: self.events_seen.load(Ordering::Relaxed),
            reconciliations: self.reconciliations.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of watcher stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStatsSnapshot {
    pub events_seen: u64,
    pub reconciliations: u64,
    pub requeued: u64,
    pub loads: u64,
    pub removals: u64,
    pub skipped: u64,
    pub errors: u64,
}
