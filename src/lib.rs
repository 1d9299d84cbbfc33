//! Treadmill Bridge: console control-plane
//!
//! Relays belt-speed requests from the remote front-end to the console's
//! speed service and keeps the console's Android device reachable.
//!
//! ## Architecture
//!
//! - **Device capabilities** (`device`): `adb devices` probe, reconnect script, startup procedure
//! - **Connectivity Supervisor** (`background`): fixed-interval probe and recovery loop
//! - **Speed Dispatcher** (`speed`): mph to km/h conversion and one `SetSpeed` call per request
//! - **API** (`api`): axum router exposing `/set_speed`, `/reconnect`, `/status`, `/health`

pub mod api;
pub mod background;
pub mod config;
pub mod device;
pub mod exec;
pub mod speed;

pub use background::{ConnectivitySupervisor, ReconnectAck};
pub use config::BridgeConfig;
pub use device::{ConnectivityProbe, DeviceConnectivityState, RecoveryTrigger};
pub use exec::{CommandSpec, Delivery, ExecError};
pub use speed::{mph_to_kph, RemoteCommandSender, SpeedDispatcher, MI_TO_KM};
