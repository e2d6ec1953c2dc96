//! Error types for the HTTP layer.
//!
//! [`ApiError`] is what handlers return; it implements axum's
//! `IntoResponse` and renders a JSON body `{"error": "...", "code": "..."}`.
//! [`ServerError`] covers startup: configuration, opening the database and
//! binding the listener.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dynatable_schema::SchemaError;
use dynatable_sqlite::SqliteError;
use serde::Serialize;
use thiserror::Error;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            error: error.into(),
        }
    }
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Table {0} already exists in the schema.")]
    DuplicateTable(String),

    #[error("Table {0} does not exist.")]
    TableNotFound(String),

    #[error("Field {column} does not exist in the {table} table.")]
    ColumnNotFound { table: String, column: String },

    #[error("Record with id {id} does not exist in {table}.")]
    RecordNotFound { table: String, id: i64 },

    /// Bad input: identifiers, bodies, or rows SQLite rejected.
    #[error("{0}")]
    Validation(String),

    /// The schema was written but the database could not follow; the
    /// schema has been restored.
    #[error("Migration failed: {0}")]
    MigrationFailure(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status and machine-readable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::DuplicateTable(_) => (StatusCode::BAD_REQUEST, "DUPLICATE_TABLE"),
            Self::TableNotFound(_) => (StatusCode::NOT_FOUND, "TABLE_NOT_FOUND"),
            Self::ColumnNotFound { .. } => (StatusCode::NOT_FOUND, "COLUMN_NOT_FOUND"),
            Self::RecordNotFound { .. } => (StatusCode::NOT_FOUND, "RECORD_NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::MigrationFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MIGRATION_FAILED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::DuplicateTable(name) => Self::DuplicateTable(name),
            SchemaError::TableNotFound(name) => Self::TableNotFound(name),
            SchemaError::ColumnNotFound { table, column } => Self::ColumnNotFound { table, column },
            SchemaError::InvalidDefinition(e) => Self::Validation(e.to_string()),
            err @ SchemaError::InvalidTable { .. } => Self::Validation(err.to_string()),
            other @ (SchemaError::IoError(_) | SchemaError::ParseError { .. }) => {
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<SqliteError> for ApiError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::TableNotFound(name) => Self::TableNotFound(name),
            SqliteError::RecordNotFound { table, id } => Self::RecordNotFound { table, id },
            SqliteError::InvalidIdentifier(e) => Self::Validation(e.to_string()),
            SqliteError::ValidationError(msg) | SqliteError::ConversionError(msg) => {
                Self::Validation(msg)
            }
            SqliteError::MigrationError(msg) => Self::MigrationFailure(msg),
            SqliteError::DatabaseError(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            Self::MigrationFailure(detail) => {
                tracing::error!("Migration failed: {}", detail);
                self.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

/// Errors raised while configuring or starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("database error: {0}")]
    Sqlite(#[from] SqliteError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for ServerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(SqliteError::DatabaseError(err))
    }
}

/// Convenience alias for results with [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;
