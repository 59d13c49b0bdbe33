//! HTTP server for bot status and metrics.
//!
//! Provides endpoints for:
//! - Service health check
//! - Request history and cache statistics
//! - Prometheus metrics export

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::cache::{CacheStats, FieldCache};
use crate::metrics::{BotMetrics, MetricsSnapshot};
use crate::tracker::{RequestReport, RequestTracker};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub status: String,
    pub uptime_secs: i64,
    pub requests: MetricsSnapshot,
    pub cache: CacheStats,
    pub cache_hit_rate: f64,
    pub recent_requests: Vec<RequestReport>,
}

// ============================================================================
// Server State
// ============================================================================

pub struct ServerState {
    pub metrics: Arc<BotMetrics>,
    pub tracker: Arc<RequestTracker>,
    pub cache: Arc<FieldCache>,
    pub started_at: DateTime<Utc>,
}

// ============================================================================
// Router
// ============================================================================

/// Create the status API router.
pub fn create_router(state: Arc<ServerState>, prometheus: PrometheusHandle) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(Extension(state))
        .layer(Extension(prometheus))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /status - Request history and cache statistics
async fn status_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds();
    let cache = state.cache.stats().await;

    let response = StatusResponse {
        service: "turb-bot".to_string(),
        status: "running".to_string(),
        uptime_secs,
        requests: state.metrics.snapshot(),
        cache_hit_rate: cache.hit_rate(),
        cache,
        recent_requests: state.tracker.recent().await,
    };

    Json(response)
}

/// GET /metrics - Prometheus exposition format
async fn metrics_handler(Extension(prometheus): Extension<PrometheusHandle>) -> impl IntoResponse {
    (StatusCode::OK, prometheus.render())
}

/// GET /health - Health check endpoint
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "turb-bot"
    }))
}

/// Start the HTTP server.
pub async fn run_server(
    state: Arc<ServerState>,
    prometheus: PrometheusHandle,
    port: u16,
) -> anyhow::Result<()> {
    let app = create_router(state, prometheus);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting bot status server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
