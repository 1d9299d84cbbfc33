//! Bridge Configuration - tool paths, credentials and timing as TOML values
//!
//! Each struct implements `Default` with the values the console image ships
//! with, so a missing config file means zero-change behavior.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::exec::{CommandSpec, ExecError};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "TREADMILL_CONFIG";

/// Environment variable overriding `server.addr`.
pub const SERVER_ADDR_ENV_VAR: &str = "TREADMILL_SERVER_ADDR";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "bridge_config.toml";

// ============================================================================
// Config Provenance
// ============================================================================

/// Tracks which configuration keys were explicitly present in the TOML file.
#[derive(Debug, Clone, Default)]
pub struct ConfigProvenance {
    /// Where the config came from (`None` = built-in defaults)
    pub source: Option<PathBuf>,
    /// Dotted key paths explicitly present in the file
    pub explicit_keys: HashSet<String>,
}

impl ConfigProvenance {
    pub fn is_user_set(&self, dotted_key: &str) -> bool {
        self.explicit_keys.contains(dotted_key)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with [`BridgeConfig::load`] which searches:
/// 1. an explicit path (`--config`)
/// 2. `$TREADMILL_CONFIG`
/// 3. `./bridge_config.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub supervisor: SupervisorConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub speed: SpeedConfig,
}

impl BridgeConfig {
    /// Load configuration using the standard search order.
    ///
    /// An explicit path must load: any failure is returned. The implicit
    /// sources are skipped with a warning when they fail, and the next one
    /// in the order is tried.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigProvenance), ConfigError> {
        if let Some(path) = explicit {
            let loaded = Self::load_from_file_with_provenance(path)?;
            info!(path = %path.display(), origin = "--config", "Loaded bridge config");
            return Ok(loaded);
        }

        let mut candidates: Vec<(PathBuf, &str)> = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            candidates.push((PathBuf::from(path), CONFIG_ENV_VAR));
        }
        candidates.push((PathBuf::from(LOCAL_CONFIG_FILE), "working directory"));

        for (path, origin) in candidates {
            if !path.exists() {
                if origin != "working directory" {
                    warn!(path = %path.display(), origin, "Config file does not exist, falling back");
                }
                continue;
            }
            match Self::load_from_file_with_provenance(&path) {
                Ok(loaded) => {
                    info!(path = %path.display(), origin, "Loaded bridge config");
                    return Ok(loaded);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load config, falling back");
                }
            }
        }

        info!("No bridge config found, using built-in defaults");
        Ok((Self::default(), ConfigProvenance::default()))
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let (config, _provenance) = Self::load_from_file_with_provenance(path)?;
        Ok(config)
    }

    pub fn load_from_file_with_provenance(
        path: &Path,
    ) -> Result<(Self, ConfigProvenance), ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (config, mut provenance) = Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        provenance.source = Some(path.to_path_buf());
        Ok((config, provenance))
    }

    /// Parse and validate a TOML document. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<(Self, ConfigProvenance), ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let provenance = ConfigProvenance {
            source: None,
            explicit_keys: super::validation::walk_toml_keys(
                &contents
                    .parse::<toml::Value>()
                    .unwrap_or(toml::Value::Table(Default::default())),
                "",
            )
            .into_iter()
            .collect(),
        };

        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok((config, provenance))
    }

    /// Apply `$TREADMILL_SERVER_ADDR`, then the CLI `--addr`, over the file value.
    pub fn apply_overrides(&mut self, cli_addr: Option<String>) {
        if let Ok(addr) = std::env::var(SERVER_ADDR_ENV_VAR) {
            self.server.addr = addr;
        }
        if let Some(addr) = cli_addr {
            self.server.addr = addr;
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate values that would make the bridge unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.server.addr.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "server.addr '{}' is not a valid socket address",
                self.server.addr
            ));
        }
        if self.supervisor.interval_secs == 0 {
            errors.push("supervisor.interval_secs must be > 0".to_string());
        }
        if self.device.command_timeout_secs == 0 {
            errors.push("device.command_timeout_secs must be > 0".to_string());
        }
        if self.device.startup_timeout_secs == 0 {
            errors.push("device.startup_timeout_secs must be > 0".to_string());
        }
        if self.device.probe_command().is_err() {
            errors.push("device.probe_command must name a program".to_string());
        }
        if self.device.recovery_command().is_err() {
            errors.push("device.recovery_command must name a program".to_string());
        }
        if !self.device.startup_command.is_empty() && self.device.startup_command().is_none() {
            errors.push("device.startup_command must name a program or be empty".to_string());
        }
        if self.speed.timeout_secs == 0 {
            errors.push("speed.timeout_secs must be > 0".to_string());
        }
        if self.speed.grpcurl_path.trim().is_empty() {
            errors.push("speed.grpcurl_path must not be empty".to_string());
        }
        if self.speed.target.trim().is_empty() {
            errors.push("speed.target must not be empty".to_string());
        }
        if self.speed.method.trim().is_empty() {
            errors.push("speed.method must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address.
    ///
    /// Can be overridden by `TREADMILL_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Directory served for unmatched paths, with `index.html` fallback.
    /// Empty disables static serving.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Allowed CORS origins. `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

fn default_static_dir() -> String {
    defaults::STATIC_DIR.to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            static_dir: default_static_dir(),
            cors_origins: default_cors_origins(),
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Seconds between cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    defaults::SUPERVISOR_INTERVAL_SECS
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl SupervisorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ============================================================================
// Device tooling
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Command printing the device listing.
    #[serde(default = "default_probe_command")]
    pub probe_command: Vec<String>,

    /// Command that re-establishes the device connection.
    #[serde(default = "default_recovery_command")]
    pub recovery_command: Vec<String>,

    /// One-time initialization run before the supervisor starts.
    /// Empty skips it.
    #[serde(default = "default_startup_command")]
    pub startup_command: Vec<String>,

    /// Timeout for each probe or recovery invocation (seconds).
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Timeout for the startup procedure (seconds).
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn default_probe_command() -> Vec<String> {
    argv(defaults::PROBE_COMMAND)
}

fn default_recovery_command() -> Vec<String> {
    argv(defaults::RECOVERY_COMMAND)
}

fn default_startup_command() -> Vec<String> {
    argv(defaults::STARTUP_COMMAND)
}

fn default_command_timeout_secs() -> u64 {
    defaults::DEVICE_COMMAND_TIMEOUT_SECS
}

fn default_startup_timeout_secs() -> u64 {
    defaults::STARTUP_TIMEOUT_SECS
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            probe_command: default_probe_command(),
            recovery_command: default_recovery_command(),
            startup_command: default_startup_command(),
            command_timeout_secs: default_command_timeout_secs(),
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}

impl DeviceConfig {
    pub fn probe_command(&self) -> Result<CommandSpec, ExecError> {
        CommandSpec::from_argv(&self.probe_command)
    }

    pub fn recovery_command(&self) -> Result<CommandSpec, ExecError> {
        CommandSpec::from_argv(&self.recovery_command)
    }

    /// `None` when startup is disabled or misconfigured.
    pub fn startup_command(&self) -> Option<CommandSpec> {
        CommandSpec::from_argv(&self.startup_command).ok()
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

// ============================================================================
// Speed service
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedConfig {
    #[serde(default = "default_grpcurl_path")]
    pub grpcurl_path: String,

    /// `host:port` of the speed service.
    #[serde(default = "default_speed_target")]
    pub target: String,

    /// Fully-qualified gRPC method.
    #[serde(default = "default_speed_method")]
    pub method: String,

    /// Value of the `client_id` request header.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_protoset")]
    pub protoset: String,

    #[serde(default = "default_cert")]
    pub cert: String,

    #[serde(default = "default_key")]
    pub key: String,

    #[serde(default = "default_ca_cert")]
    pub ca_cert: String,

    /// Skip server certificate verification (the console uses a self-signed cert).
    #[serde(default = "default_true")]
    pub insecure: bool,

    #[serde(default = "default_speed_timeout_secs")]
    pub timeout_secs: u64,

    /// Answer `POST /set_speed` with 502 when the call could not be sent.
    #[serde(default)]
    pub report_failures: bool,
}

fn default_grpcurl_path() -> String {
    defaults::GRPCURL_PATH.to_string()
}

fn default_speed_target() -> String {
    defaults::SPEED_TARGET.to_string()
}

fn default_speed_method() -> String {
    defaults::SPEED_METHOD.to_string()
}

fn default_client_id() -> String {
    defaults::SPEED_CLIENT_ID.to_string()
}

fn default_protoset() -> String {
    defaults::SPEED_PROTOSET.to_string()
}

fn default_cert() -> String {
    defaults::SPEED_CERT.to_string()
}

fn default_key() -> String {
    defaults::SPEED_KEY.to_string()
}

fn default_ca_cert() -> String {
    defaults::SPEED_CA_CERT.to_string()
}

fn default_speed_timeout_secs() -> u64 {
    defaults::SPEED_TIMEOUT_SECS
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            grpcurl_path: default_grpcurl_path(),
            target: default_speed_target(),
            method: default_speed_method(),
            client_id: default_client_id(),
            protoset: default_protoset(),
            cert: default_cert(),
            key: default_key(),
            ca_cert: default_ca_cert(),
            insecure: true,
            timeout_secs: default_speed_timeout_secs(),
            report_failures: false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
