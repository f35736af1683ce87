//! Data table operations: create, fill, drop, inspect, query.
//!
//! Every identifier is double-quoted; every data column is `TEXT`.

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use super::models::{QueryResult, TableSnapshot, NULL_SENTINEL};
use crate::error::StorageError;
use crate::{Error, Result};

/// Quote an identifier for interpolation into SQL.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Drop a table if it exists.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub fn drop_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
        .map_err(|e| StorageError::Database(format!("failed to drop table {table}: {e}")))?;
    Ok(())
}

/// Create `table` with the snapshot's columns and insert every row.
///
/// # Errors
///
/// Returns an error if table creation or any insert fails.
pub fn materialize(conn: &Connection, table: &str, snapshot: &TableSnapshot) -> Result<()> {
    let quoted_table = quote_ident(table);
    let quoted_columns: Vec<String> = snapshot.columns.iter().map(|c| quote_ident(c)).collect();

    let definitions: Vec<String> = quoted_columns.iter().map(|c| format!("{c} TEXT")).collect();
    conn.execute_batch(&format!(
        "CREATE TABLE {quoted_table} ({})",
        definitions.join(", ")
    ))
    .map_err(|e| StorageError::Database(format!("failed to create table {table}: {e}")))?;

    if snapshot.rows.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; quoted_columns.len()].join(", ");
    let mut stmt = conn
        .prepare(&format!(
            "INSERT INTO {quoted_table} ({}) VALUES ({placeholders})",
            quoted_columns.join(", ")
        ))
        .map_err(|e| StorageError::Database(format!("failed to prepare insert: {e}")))?;

    for row in &snapshot.rows {
        stmt.execute(rusqlite::params_from_iter(row.iter()))
            .map_err(|e| StorageError::Database(format!("failed to insert record: {e}")))?;
    }

    tracing::trace!(table, rows = snapshot.rows.len(), "Inserted rows");
    Ok(())
}

/// Column names of a table, in declaration order.
///
/// # Errors
///
/// Returns [`StorageError::NotFound`] if the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let columns = stmt
        .query_map([table], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    if columns.is_empty() {
        return Err(StorageError::not_found("table", table).into());
    }

    Ok(columns)
}

/// Run an arbitrary statement and render every cell as text.
///
/// # Errors
///
/// Returns [`StorageError::NotReadOnly`] for a statement that would write,
/// [`StorageError::NotFound`] for a missing table, otherwise
/// [`StorageError::Database`] with the engine's message.
pub fn run_query(conn: &Connection, sql: &str) -> Result<QueryResult> {
    let mut stmt = conn.prepare(sql).map_err(query_error)?;
    // Tables and the index change only through loads and removals.
    if !stmt.readonly() {
        return Err(StorageError::NotReadOnly(sql.trim().to_string()).into());
    }
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = stmt.query([]).map_err(query_error)?;
    let mut rendered = Vec::new();
    while let Some(row) = rows.next().map_err(query_error)? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(render_value(row.get_ref(i).map_err(query_error)?));
        }
        rendered.push(cells);
    }

    Ok(QueryResult {
        columns,
        rows: rendered,
    })
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => NULL_SENTINEL.to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn query_error(e: rusqlite::Error) -> Error {
    let message = e.to_string();
    match message.strip_prefix("no such table: ") {
        Some(table) => StorageError::not_found("table", table).into(),
        None => StorageError::Database(message).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_materialize_and_query() {
        let db = Database::open_in_memory().unwrap();
        let snapshot = TableSnapshot::build(
            &strings(&["id", "name"]),
            vec![strings(&["1", "Alice"]), strings(&["2"])],
        );

        let result = db
            .with_conn(|conn| {
                materialize(conn, "users", &snapshot)?;
                run_query(conn, "SELECT id, name FROM users ORDER BY id")
            })
            .unwrap();

        assert_eq!(result.columns, strings(&["id", "name"]));
        assert_eq!(result.rows, vec![strings(&["1", "Alice"]), strings(&["2", ""])]);
    }

    #[test]
    fn test_materialize_keyword_and_quote_names() {
        let db = Database::open_in_memory().unwrap();
        let snapshot = TableSnapshot::build(&strings(&["select", "from"]), vec![strings(&["a", "b"])]);

        let columns = db
            .with_conn(|conn| {
                materialize(conn, "order", &snapshot)?;
                table_columns(conn, "order")
            })
            .unwrap();

        assert_eq!(columns, strings(&["select", "from"]));
    }

    #[test]
    fn test_render_values() {
        let db = Database::open_in_memory().unwrap();
        let result = db
            .with_conn(|conn| run_query(conn, "SELECT NULL, 42, 2.5, 100.0, 'text'"))
            .unwrap();

        assert_eq!(result.rows[0], strings(&["NULL", "42", "2.5", "100", "text"]));
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let db = Database::open_in_memory().unwrap();

        let err = db
            .with_conn(|conn| run_query(conn, "SELECT * FROM nope"))
            .unwrap_err();
        assert!(err.is_not_found(), "{err}");

        let err = db.with_conn(|conn| table_columns(conn, "nope")).unwrap_err();
        assert!(err.is_not_found(), "{err}");
    }

    #[test]
    fn test_invalid_sql_is_database_error() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .with_conn(|conn| run_query(conn, "SELEKT 1"))
            .unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
    }

    #[test]
    fn test_writing_statements_are_refused() {
        let db = Database::open_in_memory().unwrap();
        let snapshot = TableSnapshot::build(&strings(&["v"]), vec![strings(&["1"])]);
        db.with_conn(|conn| materialize(conn, "kept", &snapshot)).unwrap();

        for sql in [
            "DROP TABLE kept",
            "DELETE FROM kept",
            "INSERT INTO kept VALUES ('2')",
            "CREATE TABLE extra (v TEXT)",
        ] {
            let err = db.with_conn(|conn| run_query(conn, sql)).unwrap_err();
            assert!(
                matches!(err, Error::Storage(StorageError::NotReadOnly(_))),
                "{sql}: {err}"
            );
        }

        let result = db
            .with_conn(|conn| run_query(conn, "SELECT v FROM kept"))
            .unwrap();
        assert_eq!(result.rows, vec![strings(&["1"])]);
    }

    #[test]
    fn test_drop_table_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            drop_table(conn, "never_created")?;
            drop_table(conn, "never_created")
        })
        .unwrap();
    }
}
