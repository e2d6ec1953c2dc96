//! Server startup and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::routes::router;
use crate::service::Backend;

/// Opens the backend, binds the listener, and serves until ctrl-c.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let addr: SocketAddr = config
        .listen
        .parse()
        .map_err(|e| ServerError::Config(format!("invalid listen address {}: {e}", config.listen)))?;

    let open_config = config.clone();
    let backend = tokio::task::spawn_blocking(move || Backend::open(&open_config))
        .await
        .map_err(|e| ServerError::Config(format!("startup task failed: {e}")))??;
    info!(
        database = %config.database.display(),
        schema = %config.schema.display(),
        "Backend ready"
    );

    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;
    info!("HTTP server bound to {}", actual_addr);

    let app = router(Arc::new(backend));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("HTTP server received shutdown signal");
}
