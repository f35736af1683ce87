//! `SQLite` storage for materialized tables.
//!
//! This module provides persistent storage for:
//! - One data table per tracked source file
//! - The metadata index mapping tables to source paths and stamps
//! - Schema migrations for csvql's own bookkeeping tables

mod connection;
mod metadata;
mod models;
mod schema;
mod store;
mod tables;

pub use connection::Database;
pub use metadata::MetadataCache;
pub use models::{
    FileRecord, LoadSummary, MetadataEntry, ModStamp, QueryResult, TableSnapshot, NULL_SENTINEL,
};
pub use schema::{is_reserved, migrate, verify_schema, METADATA_TABLE, SCHEMA_VERSION};
pub use store::Store;
pub use tables::quote_ident;
