//! Session Agent
//!
//! Single-binary service that:
//! 1. Loads configuration and connects to the auth API
//! 2. Bootstraps the session (refresh cookie or nothing)
//! 3. Keeps the credential fresh in the background
//! 4. Serves the session over a local HTTP API until SIGTERM/SIGINT

mod api;
mod config;
mod metrics;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use session_auth::HttpBackend;
use session_lifecycle::{SessionManager, spawn_renewal_task};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting session-agent");

    // Install before anything emits a metric
    let prometheus = metrics::install_recorder()?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout_secs,
        refresh_threshold_secs = config.session.refresh_threshold_secs,
        "configuration loaded"
    );

    let backend = HttpBackend::new(config.api.base_url.clone(), config.api.timeout())
        .context("failed to build auth API client")?;
    let manager = Arc::new(SessionManager::new(
        Arc::new(backend),
        config.session.session_config(),
    ));

    let status = manager.bootstrap().await;
    info!(status = status.label(), "session ready");

    let renewal = spawn_renewal_task(manager.clone(), config.session.renewal_interval());

    let app = api::build_router(
        AppState {
            manager,
            prometheus,
            started_at: Instant::now(),
        },
        config.server.max_connections,
    );

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;
    info!(addr = %config.server.listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    renewal.abort();
    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
