//! Background services - device connectivity supervision
//!
//! Runs as a background tokio task for the life of the process, probing the
//! console device on a fixed interval and triggering recovery when it is
//! gone. Stopped through a `CancellationToken` on shutdown.

pub mod supervisor;

pub use supervisor::{
    ConnectivitySupervisor, CycleReport, ReconnectAck, SupervisorSnapshot, RECONNECT_ACK_MESSAGE,
};
