// src/server/metrics_server.rs

use crate::core::metrics::{self, gather_metrics};
use crate::core::state::GatewayState;
use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Handles HTTP requests to the /metrics endpoint.
///
/// It updates dynamic gauges before gathering all registered metrics and
/// encoding them in the Prometheus text format.
async fn metrics_handler(state: Arc<GatewayState>) -> impl IntoResponse {
    // Update gauges that change frequently before gathering.
    metrics::CONNECTED_SESSIONS.set(state.registry.session_count() as f64);
    metrics::PENDING_TRANSLATION_TASKS.set(state.orchestrator.pending_count() as f64);

    let body = gather_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

/// Serves the JSON counter snapshot, stamped with the process run id.
async fn stats_handler(state: Arc<GatewayState>) -> impl IntoResponse {
    Json(state.stats_report())
}

/// Zeroes the gateway counters and returns the fresh report. Uptime and the
/// run id are untouched.
async fn stats_reset_handler(state: Arc<GatewayState>) -> impl IntoResponse {
    state.stats.reset();
    info!("Gateway counters reset via /stats/reset.");
    Json(state.stats_report())
}

/// Reports whether the worker channel is usable. 503 tells the orchestration
/// layer to route traffic elsewhere while the pool is unreachable.
async fn health_handler(state: Arc<GatewayState>) -> impl IntoResponse {
    if state.orchestrator.health_check().await {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "worker channel unavailable")
    }
}

/// Runs a simple HTTP server exposing /metrics, /stats (with a POST reset),
/// and /health.
pub async fn run_metrics_server(state: Arc<GatewayState>, mut shutdown_rx: broadcast::Receiver<()>) {
    let port = {
        let config = state.config.lock().await;
        config.metrics.port
    };

    let metrics_state = state.clone();
    let stats_state = state.clone();
    let reset_state = state.clone();
    let app = Router::new()
        .route("/metrics", get(move || metrics_handler(metrics_state.clone())))
        .route("/stats", get(move || stats_handler(stats_state.clone())))
        .route(
            "/stats/reset",
            post(move || stats_reset_handler(reset_state.clone())),
        )
        .route("/health", get(move || health_handler(state.clone())));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(
        "Prometheus metrics server listening on http://{}/metrics",
        addr
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server on port {}: {}", port, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
            info!("Metrics server shutting down.");
        })
        .await
    {
        error!("Metrics server error: {}", e);
    }
}
