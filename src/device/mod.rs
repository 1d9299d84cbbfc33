//! Console device capabilities
//!
//! The bridge talks to the console's Android side through two narrow
//! capabilities, so the tooling behind them can be swapped or mocked:
//! - [`ConnectivityProbe`]: read-only device listing (`adb devices`)
//! - [`RecoveryTrigger`]: reconnect procedure (`./reconnect.sh`)
//!
//! The one-time startup procedure lives in [`startup`].

pub mod probe;
pub mod recovery;
pub mod startup;

pub use probe::{listing_state, parse_device_listing, AdbProbe, DeviceEntry, READY_TOKEN};
pub use recovery::ScriptRecovery;
pub use startup::run_startup;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::exec::{Delivery, ExecError};

/// Connectivity verdict for the console device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceConnectivityState {
    Connected,
    Disconnected,
}

impl DeviceConnectivityState {
    pub fn is_connected(self) -> bool {
        self == DeviceConnectivityState::Connected
    }
}

impl std::fmt::Display for DeviceConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceConnectivityState::Connected => write!(f, "CONNECTED"),
            DeviceConnectivityState::Disconnected => write!(f, "DISCONNECTED"),
        }
    }
}

/// Source of the raw device listing.
///
/// Implementations must not change device state.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Return the device-management tool's output verbatim.
    async fn fetch_listing(&self) -> Result<String, ExecError>;
}

/// Procedure that tries to restore a lost device connection.
#[async_trait]
pub trait RecoveryTrigger: Send + Sync {
    async fn recover(&self) -> Result<Delivery, ExecError>;
}
