//! Per-path debounce set.
//!
//! Every raw notification refreshes its path's timestamp. A sweep hands out
//! only the paths that have been silent for longer than the quiet window and
//! forgets them, so a later notification queues the path again instead of
//! racing with the reconciliation already dispatched.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// A path waiting for its writes to settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    /// Source path.
    pub path: PathBuf,
    /// When the most recent notification for the path arrived.
    pub last_event: Instant,
}

/// Pending paths keyed by identity.
#[derive(Debug)]
pub struct Debouncer {
    quiet_window: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    /// Create an empty set with the given quiet window.
    #[must_use]
    pub fn new(quiet_window: Duration) -> Self {
        Self {
            quiet_window,
            pending: HashMap::new(),
        }
    }

    /// Record a notification for `path` at `now`.
    pub fn record(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now);
    }

    /// Remove and return every path silent for longer than the quiet window.
    ///
    /// The result is sorted by path.
    pub fn take_quiet(&mut self, now: Instant) -> Vec<PendingEvent> {
        let quiet_window = self.quiet_window;
        let mut ripe = Vec::new();

        self.pending.retain(|path, last_event| {
            if now.saturating_duration_since(*last_event) > quiet_window {
                ripe.push(PendingEvent {
                    path: path.clone(),
                    last_event: *last_event,
                });
                false
            } else {
                true
            }
        });

        ripe.sort_by(|a, b| a.path.cmp(&b.path));
        ripe
    }

    /// Put back a ripe event that could not be dispatched.
    ///
    /// A newer notification recorded meanwhile wins.
    pub fn requeue(&mut self, event: PendingEvent) {
        self.pending.entry(event.path).or_insert(event.last_event);
    }

    /// Number of pending paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
