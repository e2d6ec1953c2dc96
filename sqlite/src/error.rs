//! Error types for SQLite operations.
//!
//! Provides a unified error type covering database access, identifier
//! validation, row payload problems and migration failures.

use dynatable_core::ValidationError;
use thiserror::Error;

/// Errors that can occur during migration or query operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A table or column name failed identifier validation.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] ValidationError),

    /// A schema definition could not be turned into SQL.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// Applying a schema change to the live database failed.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// The live database has no table with this name.
    #[error("table {0} does not exist")]
    TableNotFound(String),

    /// No row with this id exists in the table.
    #[error("record with id {id} does not exist in {table}")]
    RecordNotFound { table: String, id: i64 },

    /// A row payload was rejected, either before reaching SQLite or by a
    /// constraint.
    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
