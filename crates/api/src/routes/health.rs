use axum::extract::State;
use axum::{routing::get, Json, Router};
use isp_core::hierarchy::RecordStore;
use isp_hierarchy::CascadeMode;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the last rebuild had to skip a collection.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Generation of the current hierarchy snapshot.
    pub generation: u64,
    /// Number of collections that failed to load in the last rebuild.
    pub warnings: usize,
    pub cascade_mode: CascadeMode,
}

/// GET /health -- returns service and hierarchy health.
async fn health_check<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
) -> Json<HealthResponse> {
    let snapshot = state.hierarchy.snapshot().await;
    let status = if snapshot.warnings.is_empty() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        generation: snapshot.generation,
        warnings: snapshot.warnings.len(),
        cascade_mode: state.hierarchy.config().cascade_mode,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router<S: RecordStore + 'static>() -> Router<AppState<S>> {
    Router::new().route("/health", get(health_check::<S>))
}
