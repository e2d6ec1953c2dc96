//! HTTP server for dynatable.
//!
//! Exposes table management (`/tables`) and row CRUD (`/records`) over a
//! single SQLite database whose tables are declared in a schema file.
//!
//! # Architecture
//!
//! - **`config`**: YAML server configuration
//! - **`service`**: blocking table and record operations over the shared connection
//! - **`handlers`** / **`routes`**: the axum surface
//! - **`error`**: error types and their JSON responses
//! - **`logging`**: tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use dynatable_server::{ServerConfig, init_logging, serve};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     init_logging(&config.log_level);
//!     serve(config).await.unwrap();
//! }
//! ```

mod config;
mod error;
mod handlers;
mod logging;
mod routes;
mod server;
mod service;

pub use config::{MigrationConfig, MigrationMode, ServerConfig};
pub use error::{ApiError, ErrorResponse, Result, ServerError};
pub use handlers::AppState;
pub use logging::init_logging;
pub use routes::router;
pub use server::serve;
pub use service::{ApiResult, Backend, RowPage};
