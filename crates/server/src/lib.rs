//! Multidav Server Library
//!
//! Serves several independent WebDAV roots from one listener. Each root is
//! mounted at `/<name>/` with its own Basic credential and an optional
//! read-only policy.

pub mod config;
pub mod core;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{ServerConfig, CONFIG_FILE};
use crate::core::{DavEngines, ServiceRegistry};

/// Install the global fmt subscriber. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already set, ignore
    }
}

pub async fn run() -> anyhow::Result<()> {
    info!("=== Multidav Server ===");

    let config = ServerConfig::load(CONFIG_FILE).context("Failed to load config")?;

    let registry = ServiceRegistry::from_config(&config).context("Invalid service definition")?;
    registry
        .ensure_roots()
        .await
        .context("Failed to prepare storage roots")?;
    if registry.is_empty() {
        warn!("No services configured; every request will get 404");
    }

    let app = crate::core::router(&registry, &DavEngines);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("WebDAV server starting on {}...", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
