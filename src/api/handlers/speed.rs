//! Speed endpoint

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::api::envelope::ApiErrorResponse;

use super::ApiState;

/// Requested belt speed
#[derive(Debug, Deserialize)]
pub struct SetSpeedRequest {
    pub mph: f64,
}

/// POST /set_speed - relay a speed to the console
///
/// Responds with the km/h value as a bare JSON number. The remote call's
/// outcome is only surfaced when failure reporting is enabled. A speed that
/// has no JSON number form (overflow to infinity) is rejected with 422.
pub async fn set_speed(
    State(state): State<ApiState>,
    Json(req): Json<SetSpeedRequest>,
) -> Response {
    let outcome = state.dispatcher.set_speed(req.mph).await;

    if !outcome.kph.is_finite() {
        return ApiErrorResponse::unprocessable(format!(
            "{} mph does not convert to a finite km/h value",
            req.mph
        ));
    }

    match outcome.delivery {
        Err(reason) if state.report_speed_failures => {
            ApiErrorResponse::bad_gateway(format!("Speed command not sent: {reason}"))
        }
        _ => Json(outcome.kph).into_response(),
    }
}
