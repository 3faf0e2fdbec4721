//! Dept Hub - cache and real-time notification server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dept_hub::{create_router, spawn_cleanup_task, AppState, Config, ConnectionRegistry};

/// Main entry point for the hub server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the store (Redis or memory) and shared state
/// 4. Start background expiry sweep
/// 5. Serve HTTP and WebSocket on the configured port
/// 6. On SIGINT/SIGTERM, stop the sweep and drop all live sessions
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dept_hub=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Dept Hub");

    let config = Config::from_env();
    info!(
        "Configuration loaded: backend={:?}, max_entries={}, port={}, cleanup_interval={}s",
        config.cache_backend, config.max_entries, config.server_port, config.cleanup_interval
    );

    let state = AppState::from_config(&config);
    let health = state.store().health_check().await;
    info!(
        backend = state.store().backend_name(),
        status = ?health.status,
        "Store initialized"
    );

    let cleanup_handle = spawn_cleanup_task(state.store().clone(), config.cleanup_interval);
    let registry = state.registry.clone();

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle, registry))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// Aborts the sweep and clears the registry so every session writer sees
/// its outbox close and ends its socket.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>, registry: Arc<ConnectionRegistry>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    cleanup_handle.abort();
    let dropped = registry.clear();
    warn!(sessions = dropped, "Expiry sweep aborted and live sessions released");
}
