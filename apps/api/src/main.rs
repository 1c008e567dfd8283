//! # Meridian API
//!
//! HTTP server for orders, wallets and bank webhooks.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Meridian API Server                             │
//! │                                                                         │
//! │  Storefront ──► HTTP (8080) ──► JWT ──► Services ───► SQLite            │
//! │                                             │                           │
//! │  Bank ────────► /api/webhooks/bank (HMAC) ──┘                           │
//! │                                             ▼                           │
//! │                                    notifications outbox                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};

use meridian_api::logging::init_logging;
use meridian_api::{build_router, ApiConfig, AppState};
use meridian_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("Starting Meridian API server...");

    // Load configuration
    let config = ApiConfig::load().context("invalid configuration")?;
    info!(
        port = config.port,
        database = %config.database_path,
        shipping_fee = config.shipping_fee,
        "Configuration loaded"
    );

    // Open database (migrations run on connect)
    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.db_max_connections),
    )
    .await
    .context("failed to open database")?;
    info!("Database ready");

    let addr = config.socket_addr()?;

    // Create shared state
    let state = Arc::new(AppState::new(db, config)?);
    let app = build_router(state.clone());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
