//! nova-api: HTTP surface of the exporter.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` | Prometheus exposition, one collection pass per request |
//! | GET | `/healthz` | Team cache and exporter status as JSON |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use nova_metrics::Exporter;

/// Shared state for handlers.
#[derive(Clone)]
pub struct ApiState {
    pub exporter: Arc<Exporter>,
}

/// Build the complete router.
pub fn build_router(exporter: Arc<Exporter>) -> Router {
    let state = ApiState { exporter };

    Router::new()
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/healthz", get(handlers::health))
        .with_state(state)
}
