//! ogproxy server binary.
//!
//! Reads its configuration from `OGPROXY_*` environment variables and serves
//! rewritten pages until killed.

use ogproxy::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ProxyConfig::from_env()?;

    tracing::info!(
        "Starting ogproxy: {} rules, identifier from {}",
        config.rules.len(),
        config.identifier
    );

    ProxyServer::new(config).run().await
}
