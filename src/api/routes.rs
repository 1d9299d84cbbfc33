//! API route definitions
//!
//! Paths match what the console front-end calls:
//! - POST /set_speed - relay a speed in mph
//! - GET  /reconnect - force a device reconnect
//! - GET  /status    - fresh device connectivity
//! - GET  /health    - process liveness and supervisor counters

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ApiState};

pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/set_speed", post(handlers::set_speed))
        .route("/reconnect", get(handlers::reconnect))
        .route("/status", get(handlers::get_status))
        .route("/health", get(handlers::get_health))
        .with_state(state)
}
