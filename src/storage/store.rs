//! The store: materialized tables plus the metadata index, behind one lock.
//!
//! Readers (`query`, `list_tables`, `needs_update`, ...) share the read side
//! of a task-fair `RwLock`; `load` and `remove` take the write side for the
//! whole transaction, so a query never observes a half-replaced table.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::connection::Database;
use super::metadata::{self, MetadataCache};
use super::models::{FileRecord, LoadSummary, MetadataEntry, ModStamp, QueryResult, TableSnapshot};
use super::schema::{is_reserved, migrate, verify_schema, SCHEMA_VERSION};
use super::tables;
use crate::error::StorageError;
use crate::observability::spans;
use crate::{Error, Result};

/// Queryable table storage with a persistent metadata index.
#[derive(Debug)]
pub struct Store {
    db: Database,
    cache: RwLock<MetadataCache>,
}

impl Store {
    /// Open (or create) the store backed by the database file at `path`.
    ///
    /// The metadata index is migrated and loaded into memory before the
    /// store is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_database(Database::open(path)?)
    }

    /// Open a store on an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_database(Database::open_in_memory()?)
    }

    fn with_database(db: Database) -> Result<Self> {
        let cache = db.with_conn(|conn| {
            migrate(conn)?;
            verify_schema(conn)?;
            MetadataCache::load(conn)
        })?;

        tracing::info!(
            path = %db.path(),
            tables = cache.len(),
            schema = SCHEMA_VERSION,
            "Store opened"
        );

        Ok(Self {
            db,
            cache: RwLock::new(cache),
        })
    }

    /// Path of the backing database file.
    #[must_use]
    pub fn path(&self) -> &str {
        self.db.path()
    }

    /// True if `table_name` is unknown or was loaded from a different stamp.
    #[must_use]
    pub fn needs_update(&self, table_name: &str, stamp: ModStamp) -> bool {
        self.cache.read().needs_update(table_name, stamp)
    }

    /// Replace `record.table_name` with the given rows, atomically.
    ///
    /// Drops any previous table of that name, creates the sanitized columns,
    /// inserts the rows padded or truncated to the column count, and upserts
    /// the metadata entry. Tables previously recorded for the same source
    /// path under another name are dropped in the same transaction. On any
    /// failure the prior table and metadata stay untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NameConflict`] if the name belongs to another
    /// source file that still exists, [`StorageError::Commit`] if the engine
    /// rejects any step.
    pub fn load(&self, record: &FileRecord, rows: Vec<Vec<String>>) -> Result<LoadSummary> {
        let table = record.table_name.as_str();
        let source = record.source();
        let _span = spans::db_span("load", table).entered();

        if table.is_empty() || is_reserved(table) {
            return Err(StorageError::NameConflict {
                table: table.to_string(),
                owner: "csvql".to_string(),
                incoming: source,
            }
            .into());
        }

        let snapshot = TableSnapshot::build(&record.header_fields, rows);
        let entry = MetadataEntry {
            table_name: table.to_string(),
            source_path: source.clone(),
            mod_stamp: record.mod_stamp,
        };

        let mut cache = self.cache.write();
        let replaced = self
            .db
            .with_transaction(|conn| {
                if let Some(owner) = metadata::get_entry(conn, table)? {
                    if owner.source_path != source && Path::new(&owner.source_path).exists() {
                        return Err(StorageError::NameConflict {
                            table: table.to_string(),
                            owner: owner.source_path,
                            incoming: source.clone(),
                        }
                        .into());
                    }
                }

                let previous: Vec<String> = metadata::tables_for_path(conn, &source)?
                    .into_iter()
                    .filter(|name| name != table)
                    .collect();
                for old in &previous {
                    tables::drop_table(conn, old)?;
                    metadata::delete_entry(conn, old)?;
                }

                tables::drop_table(conn, table)?;
                tables::materialize(conn, table, &snapshot)?;
                metadata::upsert_entry(conn, &entry)?;
                Ok(previous)
            })
            .map_err(|e| commit_error(table, e))?;

        for old in &replaced {
            cache.remove(old);
        }
        cache.insert(table, record.mod_stamp);
        drop(cache);

        if snapshot.adjusted_rows > 0 {
            tracing::debug!(
                table,
                adjusted = snapshot.adjusted_rows,
                width = snapshot.row_width(),
                "Rows padded or truncated to column count"
            );
        }

        Ok(LoadSummary {
            table_name: table.to_string(),
            columns: snapshot.row_width(),
            rows: snapshot.rows.len(),
            adjusted_rows: snapshot.adjusted_rows,
            replaced,
        })
    }

    /// Drop a table and its metadata entry. Removing an absent table is not
    /// an error; the return value says whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Commit`] if the engine rejects the drop.
    pub fn remove(&self, table_name: &str) -> Result<bool> {
        let _span = spans::db_span("remove", table_name).entered();
        if is_reserved(table_name) {
            return Ok(false);
        }

        let mut cache = self.cache.write();
        let removed = self
            .db
            .with_transaction(|conn| {
                tables::drop_table(conn, table_name)?;
                metadata::delete_entry(conn, table_name)
            })
            .map_err(|e| commit_error(table_name, e))?;

        cache.remove(table_name);
        Ok(removed)
    }

    /// Remove every table recorded for `source_path`, returning their names.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or any drop fails.
    pub fn remove_path(&self, source_path: &Path) -> Result<Vec<String>> {
        let source = source_path.to_string_lossy();
        let mut cache = self.cache.write();

        let removed = self
            .db
            .with_transaction(|conn| {
                let names = metadata::tables_for_path(conn, &source)?;
                for name in &names {
                    tables::drop_table(conn, name)?;
                    metadata::delete_entry(conn, name)?;
                }
                Ok(names)
            })
            .map_err(|e| commit_error(&source, e))?;

        for name in &removed {
            cache.remove(name);
        }
        Ok(removed)
    }

    /// Remove tables whose source file no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read or a removal fails.
    pub fn prune_missing(&self) -> Result<Vec<String>> {
        let missing: Vec<String> = self
            .entries()?
            .into_iter()
            .filter(|entry| !Path::new(&entry.source_path).exists())
            .map(|entry| entry.table_name)
            .collect();

        for name in &missing {
            self.remove(name)?;
            tracing::info!(table = %name, "Removed table for missing source");
        }

        Ok(missing)
    }

    /// Table currently recorded for a source path, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn table_for_path(&self, source_path: &Path) -> Result<Option<String>> {
        let source = source_path.to_string_lossy();
        let _guard = self.cache.read();
        let names = self
            .db
            .with_conn(|conn| metadata::tables_for_path(conn, &source))?;
        Ok(names.into_iter().next())
    }

    /// Every tracked source path with its table name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn mappings(&self) -> Result<BTreeMap<PathBuf, String>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|entry| (PathBuf::from(entry.source_path), entry.table_name))
            .collect())
    }

    /// Every metadata entry, sorted by table name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn entries(&self) -> Result<Vec<MetadataEntry>> {
        let _guard = self.cache.read();
        self.db.with_conn(metadata::list_entries)
    }

    /// Names of all materialized tables, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|entry| entry.table_name)
            .collect())
    }

    /// Column names of a table, in order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the table does not exist.
    pub fn table_info(&self, table_name: &str) -> Result<Vec<String>> {
        let _guard = self.cache.read();
        self.db
            .with_conn(|conn| tables::table_columns(conn, table_name))
    }

    /// Run a read-only statement against the store, rendering every cell as
    /// text.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotReadOnly`] for a statement that would write,
    /// [`StorageError::NotFound`] for a missing table, or the engine's error
    /// for anything else.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        let _guard = self.cache.read();
        self.db.with_conn(|conn| tables::run_query(conn, sql))
    }
}

fn commit_error(table: &str, err: Error) -> Error {
    match err {
        Error::Storage(StorageError::Database(reason)) => StorageError::commit(table, reason).into(),
        other => other,
    }
}
