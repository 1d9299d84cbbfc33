//! Liveness endpoint

use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::api::envelope::ApiResponse;
use crate::background::SupervisorSnapshot;

use super::ApiState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub supervisor_interval_secs: u64,
    /// Counters from the background loop (not a fresh probe)
    pub supervisor: SupervisorSnapshot,
}

/// GET /health - process and background-loop liveness
pub async fn get_health(State(state): State<ApiState>) -> Response {
    let supervisor = state.supervisor.snapshot_handle().read().await.clone();

    ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        supervisor_interval_secs: state.supervisor.interval().as_secs(),
        supervisor,
    })
}
