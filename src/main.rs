//! Peer Cache - A distributed in-memory cache node
//!
//! Serves the HTTP API and the peer replication protocol side by side.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peer_cache::api::create_router;
use peer_cache::sync::{serve_peers, TcpConnector};
use peer_cache::{AppState, Config};

/// Main entry point for the cache node.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache store and replication manager
/// 4. Start the peer listener and dial configured peers
/// 5. Start HTTP server on configured port
/// 6. On SIGINT/SIGTERM, stop serving and shut replication down
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peer_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Peer Cache node");

    let config = Config::from_env();
    info!(
        capacity = config.capacity,
        strategy = %config.strategy,
        http_port = config.server_port,
        peer_port = config.peer_port,
        advertised = %config.advertised_address,
        peers = ?config.peers,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config).context("invalid cache configuration")?;
    let replication = Arc::clone(&state.replication);

    // Peer protocol
    let peer_addr = SocketAddr::from(([0, 0, 0, 0], config.peer_port));
    let peer_listener = TcpListener::bind(peer_addr)
        .await
        .with_context(|| format!("failed to bind peer listener on {peer_addr}"))?;
    let listener_handle = serve_peers(peer_listener, Arc::clone(&replication));
    let dialing = replication.connect_to_peers(Arc::new(TcpConnector)).await;
    info!(node_id = %replication.node_id(), dialing, "Replication started");

    // HTTP API
    let app = create_router(state);
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let http_listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {http_addr}"))?;
    info!("Server listening on http://{}", http_addr);

    axum::serve(http_listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    listener_handle.abort();
    replication.shutdown().await;
    warn!("Peer listener and replication tasks stopped");

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = ?err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = ?err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
