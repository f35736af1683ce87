//! Data models for storage operations.
//!
//! This module defines the core data structures used for:
//! - Source file records produced by parsing
//! - Persisted metadata entries
//! - Table snapshots ready for materialization
//! - Query results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::resolver::column_names;

/// Rendering of SQL NULL in query results.
pub const NULL_SENTINEL: &str = "NULL";

/// Last-write time of a source file, in nanoseconds since the Unix epoch.
///
/// Only equality matters for staleness; any difference forces a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModStamp(i64);

impl ModStamp {
    /// Wrap a raw nanosecond count.
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Raw nanosecond count.
    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Convert a filesystem timestamp.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        let nanos = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_nanos()).map_or(i64::MIN, |n| -n),
        };
        Self(nanos)
    }

    /// Read the modification stamp of a file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn of_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_system_time(std::fs::metadata(path)?.modified()?))
    }
}

impl fmt::Display for ModStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = chrono::DateTime::from_timestamp_nanos(self.0);
        write!(f, "{}", at.to_rfc3339())
    }
}

/// A parsed source file, ready to be materialized under `table_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path of the source file.
    pub path: PathBuf,

    /// Resolved table identifier.
    pub table_name: String,

    /// Field separator used while parsing.
    pub delimiter: u8,

    /// Raw header cells, in file order.
    pub header_fields: Vec<String>,

    /// Modification stamp observed when the file was opened.
    pub mod_stamp: ModStamp,
}

impl FileRecord {
    /// Source path as stored in the metadata index.
    #[must_use]
    pub fn source(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// One row of the persisted metadata index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Unique table name.
    pub table_name: String,

    /// Source path the table was materialized from.
    pub source_path: String,

    /// Stamp of the source at materialization time.
    pub mod_stamp: ModStamp,
}

/// Column layout plus row data, every row exactly `columns.len()` wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    /// Sanitized, de-duplicated column identifiers.
    pub columns: Vec<String>,

    /// Row data.
    pub rows: Vec<Vec<String>>,

    /// Number of rows that had to be padded or truncated.
    pub adjusted_rows: usize,
}

impl TableSnapshot {
    /// Build a snapshot from raw header cells and rows.
    ///
    /// Short rows are padded with empty strings, long rows are truncated.
    #[must_use]
    pub fn build(headers: &[String], mut rows: Vec<Vec<String>>) -> Self {
        let columns = column_names(headers);
        let width = columns.len();

        let mut adjusted_rows = 0;
        for row in &mut rows {
            if row.len() != width {
                row.resize(width, String::new());
                adjusted_rows += 1;
            }
        }

        Self {
            columns,
            rows,
            adjusted_rows,
        }
    }

    /// Number of columns every row is normalized to.
    #[must_use]
    pub fn row_width(&self) -> usize {
        self.columns.len()
    }
}

/// Result of a query, every cell rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column labels as reported by the engine.
    pub columns: Vec<String>,

    /// Rendered rows.
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    /// Number of rows returned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no rows were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// Table that now holds the data.
    pub table_name: String,

    /// Column count.
    pub columns: usize,

    /// Row count.
    pub rows: usize,

    /// Rows padded or truncated to the column count.
    pub adjusted_rows: usize,

    /// Tables previously recorded for the same source that were dropped.
    pub replaced: Vec<String>,
}
