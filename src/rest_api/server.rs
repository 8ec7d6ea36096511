//! Axum HTTP server for the REST API

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::controller::ControllerState;
use crate::{Error, Result};

use super::handlers;

/// Metrics endpoint handler
async fn metrics_handler() -> String {
    use prometheus_client::encoding::text::encode;
    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &crate::controller::metrics::REGISTRY) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    buffer
}

fn router(state: Arc<ControllerState>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/readyz", get(handlers::ready))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/status", get(handlers::operator_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the REST API server until the shutdown signal fires
pub async fn run_server(state: Arc<ControllerState>, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let shutdown = state.shutdown.clone();
    let app = router(state);

    info!("REST API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.wait())
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

    Ok(())
}
