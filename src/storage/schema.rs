//! Database schema definitions and migrations.
//!
//! Only csvql's own bookkeeping tables are migrated here. Data tables are
//! created and dropped by the store as source files come and go.

use rusqlite::Connection;

use crate::error::StorageError;
use crate::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Metadata index: one row per materialized table.
pub const METADATA_TABLE: &str = "_csvql_metadata";

/// Applied migrations.
pub const MIGRATIONS_TABLE: &str = "_csvql_schema_migrations";

/// True for names that data tables must never take.
#[must_use]
pub fn is_reserved(table: &str) -> bool {
    table.eq_ignore_ascii_case(METADATA_TABLE)
        || table.eq_ignore_ascii_case(MIGRATIONS_TABLE)
        || table.to_ascii_lowercase().starts_with("sqlite_")
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if migrations fail.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )"
        ),
        [],
    )
    .map_err(|e| StorageError::Migration(format!("failed to create migrations table: {e}")))?;

    let current_version = get_current_version(conn)?;
    tracing::debug!(
        current = current_version,
        target = SCHEMA_VERSION,
        "Checking database migrations"
    );

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn get_current_version(conn: &Connection) -> Result<i32> {
    let result = conn.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {MIGRATIONS_TABLE}"),
        [],
        |row| row.get(0),
    );

    match result {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(StorageError::Migration(format!("failed to get version: {e}")).into()),
    }
}

fn record_migration(conn: &Connection, version: i32) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        &format!("INSERT INTO {MIGRATIONS_TABLE} (version, applied_at) VALUES (?, ?)"),
        rusqlite::params![version, now],
    )
    .map_err(|e| StorageError::Migration(format!("failed to record migration: {e}")))?;

    Ok(())
}

/// Migration v1: metadata index.
fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Applying migration v1: metadata index");

    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {METADATA_TABLE} (
            table_name TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            mod_time INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_csvql_metadata_file_path ON {METADATA_TABLE}(file_path);
        "
    ))
    .map_err(|e| StorageError::Migration(format!("v1 migration failed: {e}")))?;

    record_migration(conn, 1)?;

    Ok(())
}

/// Verify all expected tables exist.
///
/// # Errors
///
/// Returns an error if any expected table is missing from the schema.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    for table in [METADATA_TABLE, MIGRATIONS_TABLE] {
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?",
                [table],
                |_| Ok(true),
            )
            .unwrap_or(false);

        if !exists {
            return Err(StorageError::Migration(format!("table '{table}' not found")).into());
        }
    }

    tracing::debug!("Schema verification passed");
    Ok(())
}
