//! Structured logging and tracing configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Structured logging with JSON output option
//! - Configurable log levels, overridable through `RUST_LOG`
//! - Span helpers for reconciliation and store operations

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Initialize tracing with the given level and output format.
///
/// `RUST_LOG` takes precedence over `level` when set. Calling this a second
/// time in the same process is a no-op.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default()
            .with(env_filter)
            .with(json_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer().with_target(true).with_thread_ids(true);

        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };

    if installed.is_ok() {
        tracing::debug!("Tracing initialized: level={}, json={}", level, json);
    }
}

/// Span helpers shared by the watcher and the store.
pub mod spans {
    use std::path::Path;
    use tracing::{debug_span, info_span, Span};

    /// Span covering one reconciliation of a source path.
    #[must_use]
    pub fn reconcile_span(path: &Path) -> Span {
        info_span!("reconcile", path = %path.display())
    }

    /// Span for a store mutation against one table.
    #[must_use]
    pub fn db_span(operation: &str, table: &str) -> Span {
        debug_span!(
            "db_operation",
            operation = %operation,
            table = %table,
        )
    }
}
