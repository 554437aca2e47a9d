//! Route handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::{debug, warn};

use crate::ApiState;

/// Body of `GET /healthz`.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub api_version: String,
    pub include_expensive: bool,
    pub active_metrics: usize,
    pub team_cache: TeamCacheStatus,
}

#[derive(Debug, Serialize)]
pub struct TeamCacheStatus {
    /// 0 until the first successful refresh.
    pub generation: u64,
    pub tenants: usize,
    pub suffix: String,
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let (report, body) = nova_metrics::scrape(&state.exporter).await;
    if report.is_success() {
        debug!(samples = report.samples, "scrape complete");
    } else {
        warn!(
            failed = ?report.failed,
            interrupted = report.interrupted,
            samples = report.samples,
            "scrape finished with errors"
        );
    }
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
///
/// Always 200: an empty team cache means lookups return no team, which
/// does not stop the exporter from serving.
pub async fn health(State(state): State<ApiState>) -> Json<HealthStatus> {
    let exporter = &state.exporter;
    let teams = exporter.teams().snapshot();
    let generation = teams.generation();
    Json(HealthStatus {
        status: if generation == 0 { "starting" } else { "ok" },
        api_version: exporter.api_version().to_string(),
        include_expensive: exporter.options().include_expensive,
        active_metrics: exporter.descriptors().count(),
        team_cache: TeamCacheStatus {
            generation,
            tenants: teams.len(),
            suffix: exporter.teams().suffix().to_string(),
        },
    })
}
