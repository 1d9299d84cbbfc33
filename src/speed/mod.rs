//! Speed command dispatcher
//!
//! Converts a requested belt speed from mph to km/h and relays it to the
//! console's speed service. One outbound call per request: no retry, no
//! idempotency key, and no read-back of the applied speed.

mod grpcurl;

pub use grpcurl::GrpcurlSender;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::exec::{Delivery, ExecError};

/// Miles to kilometres.
pub const MI_TO_KM: f64 = 1.60934;

pub fn mph_to_kph(mph: f64) -> f64 {
    mph * MI_TO_KM
}

/// Channel to the remote speed-control service.
#[async_trait]
pub trait RemoteCommandSender: Send + Sync {
    async fn send_speed(&self, kph: f64) -> Result<Delivery, ExecError>;
}

/// Result of one speed request.
#[derive(Debug, Clone, Serialize)]
pub struct SpeedOutcome {
    pub mph: f64,
    pub kph: f64,
    /// What happened to the outbound call. Not part of the default response.
    #[serde(skip)]
    pub delivery: Result<Delivery, String>,
}

impl SpeedOutcome {
    pub fn send_failed(&self) -> bool {
        self.delivery.is_err()
    }
}

#[derive(Clone)]
pub struct SpeedDispatcher {
    sender: Arc<dyn RemoteCommandSender>,
}

impl SpeedDispatcher {
    pub fn new(sender: Arc<dyn RemoteCommandSender>) -> Self {
        Self { sender }
    }

    /// Convert and send. The computed km/h is returned whatever the
    /// remote call did. A conversion that overflows to infinity (or a NaN
    /// input) is never sent.
    pub async fn set_speed(&self, mph: f64) -> SpeedOutcome {
        let kph = mph_to_kph(mph);
        info!(mph, kph, "Setting speed");

        if !kph.is_finite() {
            warn!(mph, "Speed is not a finite number, not sending");
            return SpeedOutcome {
                mph,
                kph,
                delivery: Err(format!("speed {kph} km/h is not a finite number")),
            };
        }

        let delivery = match self.sender.send_speed(kph).await {
            Ok(delivery) => {
                if !delivery.is_confirmed() {
                    warn!(kph, outcome = %delivery, "Speed command not confirmed");
                }
                Ok(delivery)
            }
            Err(e) => {
                warn!(kph, error = %e, "Speed command could not be sent");
                Err(e.to_string())
            }
        };

        SpeedOutcome { mph, kph, delivery }
    }
}
