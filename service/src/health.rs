//! Health and metrics HTTP endpoints (§11 ambient stack), served on two
//! separate listeners exactly as the teacher's own reference service does:
//! liveness/readiness on `bind_addr`, Prometheus text on its own
//! `metrics_addr`, so a scrape outage never competes with probe traffic.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use dlq_resilience::metrics::MetricsServer;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the liveness/readiness router: `/health`, `/health/live`,
/// `/health/ready` (the last pinging the database pool).
#[must_use]
pub fn health_router(pool: PgPool) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(health))
        .route("/health/ready", get(ready))
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}

/// Build the metrics router: `/metrics` in Prometheus text exposition format.
#[must_use]
pub fn metrics_router(metrics: Arc<MetricsServer>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_text))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn ready(State(pool): State<PgPool>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => (StatusCode::OK, "ready").into_response(),
        Err(error) => {
            tracing::warn!(%error, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
        }
    }
}

async fn metrics_text(State(metrics): State<Arc<MetricsServer>>) -> impl IntoResponse {
    metrics.render()
}
