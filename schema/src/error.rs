//! Error types for schema file operations.
//!
//! Covers I/O on the schema file, malformed schema text, and structural
//! problems with a requested mutation.

use dynatable_core::ValidationError;
use thiserror::Error;

/// Errors that can occur while reading, mutating or writing the schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Schema file I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Schema text could not be parsed.
    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// A table with this name is already declared.
    #[error("table {0} already exists in the schema")]
    DuplicateTable(String),

    /// No table with this name is declared.
    #[error("table {0} does not exist")]
    TableNotFound(String),

    /// The table exists but has no column with this name.
    #[error("column {column} does not exist in the {table} table")]
    ColumnNotFound { table: String, column: String },

    /// A name or definition failed validation.
    #[error("invalid definition: {0}")]
    InvalidDefinition(#[from] ValidationError),

    /// A new table failed validation; every problem found is listed.
    #[error("invalid table {table}: {}", join_errors(.errors))]
    InvalidTable {
        table: String,
        errors: Vec<ValidationError>,
    },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias for results with [`SchemaError`].
pub type Result<T> = std::result::Result<T, SchemaError>;
