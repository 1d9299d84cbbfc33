//! API route handlers
//!
//! - Device connectivity: status query and forced reconnect
//! - Speed relay
//! - Process liveness

mod device;
mod health;
mod speed;

pub use device::*;
pub use health::*;
pub use speed::*;

use std::time::Instant;

use crate::background::ConnectivitySupervisor;
use crate::speed::SpeedDispatcher;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Connectivity supervisor (shared with the background loop)
    pub supervisor: ConnectivitySupervisor,
    /// Speed relay
    pub dispatcher: SpeedDispatcher,
    /// Surface failed speed sends as 502 instead of returning the km/h
    pub report_speed_failures: bool,
    /// Process start, for uptime
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(supervisor: ConnectivitySupervisor, dispatcher: SpeedDispatcher) -> Self {
        Self {
            supervisor,
            dispatcher,
            report_speed_failures: false,
            started_at: Instant::now(),
        }
    }

    pub fn with_speed_failure_reporting(mut self, enabled: bool) -> Self {
        self.report_speed_failures = enabled;
        self
    }
}
