//! Route table.

use axum::Router;
use axum::routing::get;

use crate::handlers::{self, AppState};

/// Builds the application router over shared backend state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/tables",
            get(handlers::list_tables).post(handlers::create_table),
        )
        .route(
            "/tables/{name}",
            get(handlers::get_table)
                .delete(handlers::delete_table)
                .put(handlers::rename_column),
        )
        .route(
            "/records/{table}",
            get(handlers::list_records).post(handlers::create_record),
        )
        .route(
            "/records/{table}/{id}",
            get(handlers::get_record)
                .patch(handlers::update_record)
                .delete(handlers::delete_record),
        )
        .with_state(state)
}
