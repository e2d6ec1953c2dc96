//! Core table types and identifier validation for dynatable.
//!
//! This crate defines the data model shared by the schema store, the SQLite
//! layer and the HTTP server:
//!
//! - [`TableDefinition`] / [`ColumnDefinition`]: tables as declared in the
//!   schema file.
//! - [`TableInfo`] / [`ColumnInfo`]: tables as reported by the live
//!   database.
//! - [`Row`]: an untyped row (column name to scalar JSON value).
//!
//! Validation ([`validate_identifier`], [`validate_new_table`]) guards every
//! name that is later interpolated into SQL text.
//!
//! # Example
//!
//! ```
//! use dynatable_core::*;
//!
//! let columns = vec![ColumnDefinition::new("email", "String")];
//! assert!(validate_new_table("users", &columns).is_empty());
//!
//! let mut table = TableDefinition::new("users").with_column(ColumnDefinition::primary_key());
//! table.columns.extend(columns);
//! assert_eq!(table.column_names(), vec!["id", "email"]);
//! ```

mod types;
mod validate;

pub use types::*;
pub use validate::{
    MAX_IDENTIFIER_LEN, ValidationError, quote_identifier, validate_column_attributes,
    validate_column_type, validate_identifier, validate_new_table,
};
