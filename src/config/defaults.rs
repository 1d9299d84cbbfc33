//! System-wide default constants.
//!
//! Grouped by subsystem. These are the values used when no config file
//! is present.

// ============================================================================
// Server
// ============================================================================

/// HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8000";

/// Front-end bundle served for unmatched paths.
pub const STATIC_DIR: &str = "frontend/dist";

// ============================================================================
// Supervisor
// ============================================================================

/// Seconds between connectivity cycles.
pub const SUPERVISOR_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Device tooling
// ============================================================================

pub const PROBE_COMMAND: &[&str] = &["adb", "devices"];

pub const RECOVERY_COMMAND: &[&str] = &["./reconnect.sh"];

pub const STARTUP_COMMAND: &[&str] = &["./startup.sh"];

/// Upper bound on a single probe or recovery invocation (seconds).
///
/// `adb` can hang for a long time on a half-open TCP connection.
pub const DEVICE_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Upper bound on the startup procedure (seconds).
pub const STARTUP_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// Speed service
// ============================================================================

pub const GRPCURL_PATH: &str = "grpcurl";

pub const SPEED_TARGET: &str = "localhost:54321";

pub const SPEED_METHOD: &str = "com.ifit.glassos.SpeedService/SetSpeed";

pub const SPEED_CLIENT_ID: &str = "com.ifit.eriador";

pub const SPEED_PROTOSET: &str = "protos/speedservice.protoset";

pub const SPEED_CERT: &str = "keys/cert.txt";

pub const SPEED_KEY: &str = "keys/key.txt";

pub const SPEED_CA_CERT: &str = "keys/ca_cert.txt";

/// Upper bound on one `grpcurl` call (seconds).
pub const SPEED_TIMEOUT_SECS: u64 = 10;
