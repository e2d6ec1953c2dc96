//! HTTP endpoint handlers.
//!
//! This module provides the request handlers for:
//! - `/health` - Health check endpoint
//! - `/tables` - Table listing, creation, deletion and column renames
//! - `/records/{table}` - Row CRUD
//!
//! Database work runs on tokio's blocking pool; handlers only parse
//! requests and shape responses.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_RANGE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use dynatable_core::{ColumnDefinition, Row, TableInfo};
use dynatable_sqlite::Page;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::service::{ApiResult, Backend};

/// Shared handler state.
pub type AppState = Arc<Backend>;

/// Request body for `POST /tables`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableRequest {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
}

/// Request body for `PUT /tables/{name}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameColumnRequest {
    pub old_name: String,
    pub new_name: String,
}

/// Paging parameters for `GET /records/{table}`.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

/// Response body carrying a human-readable message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Response body for `POST /records/{table}`.
#[derive(Debug, Serialize)]
pub struct CreatedRecordResponse {
    pub message: String,
    pub id: i64,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Runs `f` against the backend on the blocking pool.
async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Backend) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let backend = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&backend))
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}

/// Health check endpoint.
///
/// # Response
///
/// ```json
/// {"status": "ok"}
/// ```
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Creates a table.
///
/// # Request Body
///
/// ```json
/// {"tableName": "users", "columns": [{"name": "email", "type": "String"}]}
/// ```
pub async fn create_table(
    State(state): State<AppState>,
    body: Result<Json<CreateTableRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let Json(request) = body?;
    let name = request.table_name.clone();
    blocking(&state, move |b| b.create_table(&request.table_name, request.columns)).await?;
    Ok((
        StatusCode::CREATED,
        MessageResponse::new(format!("Table {name} created and migration applied.")),
    ))
}

/// Lists live tables with their columns.
///
/// Sets `Content-Range: tables 0-N/N`.
pub async fn list_tables(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let tables = blocking(&state, |b| b.list_tables()).await?;
    let range = format!("tables 0-{}/{}", tables.len(), tables.len());
    Ok(([(CONTENT_RANGE, range)], Json(tables)))
}

/// Returns one live table.
pub async fn get_table(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<TableInfo>> {
    let Path(name) = path?;
    let table = blocking(&state, move |b| b.get_table(&name)).await?;
    Ok(Json(table))
}

/// Deletes a table from the schema and the database.
pub async fn delete_table(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(name) = path?;
    let table = name.clone();
    blocking(&state, move |b| b.delete_table(&table)).await?;
    Ok(MessageResponse::new(format!(
        "Table {name} has been deleted and migration applied."
    )))
}

/// Renames a column.
///
/// # Request Body
///
/// ```json
/// {"oldName": "mail", "newName": "email"}
/// ```
pub async fn rename_column(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<RenameColumnRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(table) = path?;
    let Json(request) = body?;
    let message = format!(
        "Field {} renamed to {} in table {table}.",
        request.old_name, request.new_name
    );
    blocking(&state, move |b| {
        b.rename_column(&table, &request.old_name, &request.new_name)
    })
    .await?;
    Ok(MessageResponse::new(message))
}

/// Inserts a row. The body is a flat JSON object of column values.
pub async fn create_record(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<Row>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedRecordResponse>)> {
    let Path(table) = path?;
    let Json(row) = body?;
    let name = table.clone();
    let id = blocking(&state, move |b| b.insert_record(&table, &row)).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedRecordResponse {
            message: format!("Record with id {id} created in {name}."),
            id,
        }),
    ))
}

/// Lists rows, optionally paged with `?offset=&limit=`.
///
/// Sets `Content-Range: records START-END/TOTAL`.
pub async fn list_records(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(table) = path?;
    let Query(params) = params?;
    let page = Page {
        offset: params.offset.unwrap_or(0),
        limit: params.limit,
    };
    let result = blocking(&state, move |b| b.list_records(&table, page)).await?;
    let end = result.offset + result.rows.len() as u64;
    let range = format!("records {}-{end}/{}", result.offset, result.total);
    Ok(([(CONTENT_RANGE, range)], Json(result.rows)))
}

/// Returns one row.
pub async fn get_record(
    State(state): State<AppState>,
    path: Result<Path<(String, i64)>, PathRejection>,
) -> ApiResult<Json<Row>> {
    let Path((table, id)) = path?;
    let row = blocking(&state, move |b| b.get_record(&table, id)).await?;
    Ok(Json(row))
}

/// Updates the given columns of one row.
pub async fn update_record(
    State(state): State<AppState>,
    path: Result<Path<(String, i64)>, PathRejection>,
    body: Result<Json<Row>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path((table, id)) = path?;
    let Json(row) = body?;
    let name = table.clone();
    blocking(&state, move |b| b.update_record(&table, id, &row)).await?;
    Ok(MessageResponse::new(format!(
        "Record with id {id} updated in {name}."
    )))
}

/// Deletes one row.
pub async fn delete_record(
    State(state): State<AppState>,
    path: Result<Path<(String, i64)>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path((table, id)) = path?;
    let name = table.clone();
    blocking(&state, move |b| b.delete_record(&table, id)).await?;
    Ok(MessageResponse::new(format!(
        "Record with id {id} deleted from {name}."
    )))
}
