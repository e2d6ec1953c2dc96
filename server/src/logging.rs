//! Logging setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` is used as the
/// filter. Calling this twice is harmless: the second install is ignored.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if subscriber.try_init().is_ok() {
        tracing::debug!(default_level, "logging initialized");
    }
}
