//! Device endpoints: connectivity status, forced reconnect

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::background::ReconnectAck;

use super::ApiState;

/// Connectivity verdict
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
}

/// GET /status - probe the device now
///
/// Always 200. A probe tool that cannot be run reports `connected: false`.
pub async fn get_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let verdict = state.supervisor.query_status().await;
    Json(StatusResponse {
        connected: verdict.is_connected(),
    })
}

/// GET /reconnect - run the recovery procedure
///
/// Always answers `{"message": "Reconnected"}`; the device may still be
/// disconnected afterwards.
pub async fn reconnect(State(state): State<ApiState>) -> Json<ReconnectAck> {
    Json(state.supervisor.force_reconnect().await)
}
