//! Slack Relay server.
//!
//! This binary:
//! - Loads configuration and the signing secret
//! - Probes Redis, running without it if the probe fails
//! - Serves `/command` and `/health` until SIGINT/SIGTERM

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use slack_relay::{router, AppState, CommandPublisher, Config, RedisPublisher};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::from_env();

    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("relay_server_starting");

    config.load_signing_secret();
    info!(
        port = config.port,
        log_level = config.log_level.as_str(),
        redis_channel = %config.redis_channel,
        redis_host = %config.redis_host,
        redis_port = config.redis_port,
        signature_verification = config.signature_verification_enabled(),
        "config_loaded"
    );

    let publisher = connect_publisher(&config).await;

    let port = config.port;
    let state = AppState::new(config, publisher);
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "relay_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("relay_server_shutdown_complete");

    Ok(())
}

/// Probe Redis once. A failed probe disables publishing instead of stopping
/// the server.
async fn connect_publisher(config: &Config) -> Option<Arc<dyn CommandPublisher>> {
    let url = config.redis_url();

    match RedisPublisher::connect(&url, config.redis_probe_timeout).await {
        Ok(publisher) => {
            info!(
                redis_host = %config.redis_host,
                redis_port = config.redis_port,
                "redis_connected"
            );
            Some(Arc::new(publisher))
        }
        Err(e) => {
            warn!(
                redis_host = %config.redis_host,
                redis_port = config.redis_port,
                error = %e,
                "redis_unavailable_publishing_disabled"
            );
            None
        }
    }
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("relay_server_shutting_down");
}
