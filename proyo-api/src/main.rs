//! Proyo API Server Entry Point
//!
//! Loads configuration, checks the database, registers the gateway webhook
//! and serves until Ctrl-C or SIGTERM.

use std::sync::Arc;

use proyo_api::telemetry::{init_tracing, TelemetryConfig};
use proyo_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState, DbConfig, PgExecutor};
use proyo_core::QueryExecutor;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let api_config = ApiConfig::from_env();
    let db_config = DbConfig::from_env();
    let executor = PgExecutor::from_config(&db_config)?;

    // Fail fast when the store is unreachable.
    executor.ping().await?;
    tracing::info!(pool_size = executor.pool_size(), "Database connection established");

    let addr = api_config.socket_addr();
    let state = AppState::new(Arc::new(executor), api_config).await;
    tracing::info!(
        webhook_id = %state.config.gateway_webhook_id,
        url = %state.config.webhook_url(state.config.gateway_webhook_id),
        "Gateway webhook ready"
    );
    let app = create_api_router(state);

    tracing::info!(%addr, "Starting Proyo API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
    tracing::info!("Shutdown signal received");
}
