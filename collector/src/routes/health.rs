//! Health and stats endpoints.
//!
//! Served on their own listener so probes keep working while the receivers
//! are saturated.

use crate::metrics::{PipelineStats, StatsSnapshot};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (always "healthy" if reachable).
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Creates the health check and stats routes.
pub fn health_routes(stats: Arc<PipelineStats>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(pipeline_stats))
        .with_state(stats)
}

/// Liveness only: answers as long as the process serves requests.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "beacon-collector",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn pipeline_stats(State(stats): State<Arc<PipelineStats>>) -> Json<StatsSnapshot> {
    Json(stats.snapshot())
}
