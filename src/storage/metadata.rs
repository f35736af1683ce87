//! Metadata index: which table came from which file, and at what stamp.
//!
//! The persisted index lives in `_csvql_metadata`. [`MetadataCache`] mirrors
//! the `table → stamp` column in memory so staleness checks never touch the
//! database. Only the store's write path mutates either of them.

use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;

use super::models::{MetadataEntry, ModStamp};
use super::schema::METADATA_TABLE;
use crate::error::StorageError;
use crate::Result;

/// Get the entry for a table.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_entry(conn: &Connection, table_name: &str) -> Result<Option<MetadataEntry>> {
    conn.query_row(
        &format!("SELECT table_name, file_path, mod_time FROM {METADATA_TABLE} WHERE table_name = ?"),
        [table_name],
        |row| {
            Ok(MetadataEntry {
                table_name: row.get(0)?,
                source_path: row.get(1)?,
                mod_stamp: ModStamp::from_nanos(row.get(2)?),
            })
        },
    )
    .optional()
    .map_err(|e| StorageError::Database(e.to_string()).into())
}

/// Insert or replace the entry keyed by its table name.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn upsert_entry(conn: &Connection, entry: &MetadataEntry) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO {METADATA_TABLE} (table_name, file_path, mod_time) VALUES (?, ?, ?)"
        ),
        rusqlite::params![
            entry.table_name,
            entry.source_path,
            entry.mod_stamp.as_nanos()
        ],
    )
    .map_err(|e| StorageError::Database(e.to_string()))?;
    Ok(())
}

/// Delete the entry for a table. Returns whether a row was removed.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_entry(conn: &Connection, table_name: &str) -> Result<bool> {
    let removed = conn
        .execute(
            &format!("DELETE FROM {METADATA_TABLE} WHERE table_name = ?"),
            [table_name],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;
    Ok(removed > 0)
}

/// Tables recorded for a source path, sorted by name.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn tables_for_path(conn: &Connection, source_path: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT table_name FROM {METADATA_TABLE} WHERE file_path = ? ORDER BY table_name"
        ))
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let names = stmt
        .query_map([source_path], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(names)
}

/// All entries, sorted by table name.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_entries(conn: &Connection) -> Result<Vec<MetadataEntry>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT table_name, file_path, mod_time FROM {METADATA_TABLE} ORDER BY table_name"
        ))
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let entries = stmt
        .query_map([], |row| {
            Ok(MetadataEntry {
                table_name: row.get(0)?,
                source_path: row.get(1)?,
                mod_stamp: ModStamp::from_nanos(row.get(2)?),
            })
        })
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(entries)
}

/// In-memory mirror of the persisted `table → stamp` index.
#[derive(Debug, Default)]
pub struct MetadataCache {
    stamps: HashMap<String, ModStamp>,
}

impl MetadataCache {
    /// Populate the cache from the persisted index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn load(conn: &Connection) -> Result<Self> {
        let stamps = list_entries(conn)?
            .into_iter()
            .map(|entry| (entry.table_name, entry.mod_stamp))
            .collect();
        Ok(Self { stamps })
    }

    /// True when the table is unknown or was loaded from a different stamp.
    #[must_use]
    pub fn needs_update(&self, table_name: &str, stamp: ModStamp) -> bool {
        self.stamps.get(table_name) != Some(&stamp)
    }

    /// Stamp recorded for a table.
    #[must_use]
    pub fn stamp(&self, table_name: &str) -> Option<ModStamp> {
        self.stamps.get(table_name).copied()
    }

    pub(crate) fn insert(&mut self, table_name: &str, stamp: ModStamp) {
        self.stamps.insert(table_name.to_string(), stamp);
    }

    pub(crate) fn remove(&mut self, table_name: &str) {
        self.stamps.remove(table_name);
    }

    /// Number of tracked tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    /// True when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}
