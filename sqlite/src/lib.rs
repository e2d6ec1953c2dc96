//! SQLite backend for dynatable.
//!
//! This crate turns declared tables into live SQLite tables and runs ad hoc
//! row operations against them. Identifiers are validated and quoted before
//! they reach SQL; values are always bound.
//!
//! # Architecture
//!
//! The crate is organized into five modules:
//!
//! - **`schema`**: DDL generation from table definitions
//! - **`migration`**: the in-process runner, history, sync and status
//! - **`external`**: a runner that delegates to an external command
//! - **`convert`**: JSON value to SQLite value conversions
//! - **`query`**: live-table introspection and row CRUD
//!
//! # Quick start: migrations
//!
//! ```no_run
//! use dynatable_schema::SchemaStore;
//! use dynatable_sqlite::Migration;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("dev.db").unwrap();
//! let store = SchemaStore::new("schema.dyn");
//! let text = store.read_text().unwrap();
//! let doc = store.load().unwrap();
//!
//! let mut migration = Migration::new(&conn).unwrap();
//! let report = migration.sync(&doc, &text, false).unwrap();
//! println!("created {:?}", report.created);
//! ```
//!
//! # Quick start: rows
//!
//! ```no_run
//! use dynatable_sqlite::{Page, RecordQuery};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("dev.db").unwrap();
//! let query = RecordQuery::new(&conn);
//! for table in query.list_tables().unwrap() {
//!     let rows = query.list_rows(&table.name, Page::default()).unwrap();
//!     println!("{}: {} rows", table.name, rows.len());
//! }
//! ```

mod convert;
mod error;
mod external;
mod migration;
mod query;
mod schema;

pub use error::{Result, SqliteError};
pub use external::{CommandMigrator, DEFAULT_MIGRATION_TIMEOUT};
pub use migration::{
    Migration, MigrationRecord, MigrationReport, MigrationRunner, MigrationStatus, SchemaChange,
    SyncReport,
};
pub use query::{Page, RecordQuery};
pub use schema::{
    DEFAULT_SYSTEM_TABLES, MIGRATIONS_TABLE, column_sql, create_table_sql, drop_table_sql,
    rename_column_sql, sql_type,
};
