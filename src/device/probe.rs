//! `adb devices` listing parser and probe

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{ConnectivityProbe, DeviceConnectivityState};
use crate::exec::{self, CommandSpec, ExecError};

/// State token `adb` reports for a device that is attached and authorized.
pub const READY_TOKEN: &str = "device";

/// Field delimiter of the listing table.
const FIELD_DELIMITER: char = '\t';

/// One row of the device listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Serial number or `host:port` of the device
    pub identifier: String,
    /// Remaining fields on the row (`device`, `offline`, `unauthorized`, ...)
    pub tokens: Vec<String>,
}

impl DeviceEntry {
    pub fn is_ready(&self) -> bool {
        self.identifier == READY_TOKEN || self.tokens.iter().any(|t| t == READY_TOKEN)
    }
}

/// Parse the tool's tabular output.
///
/// The first line is the header and is always skipped. Blank rows are
/// dropped; any other row is kept even if it has a single field.
pub fn parse_device_listing(raw: &str) -> Vec<DeviceEntry> {
    raw.trim()
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut fields = line.split(FIELD_DELIMITER);
            let identifier = fields.next()?.to_string();
            Some(DeviceEntry {
                identifier,
                tokens: fields.map(str::to_string).collect(),
            })
        })
        .collect()
}

/// CONNECTED iff any non-header row has a field equal to `device`.
pub fn listing_state(raw: &str) -> DeviceConnectivityState {
    if parse_device_listing(raw).iter().any(DeviceEntry::is_ready) {
        DeviceConnectivityState::Connected
    } else {
        DeviceConnectivityState::Disconnected
    }
}

/// Probe backed by the configured listing command.
pub struct AdbProbe {
    command: CommandSpec,
    timeout: Duration,
}

impl AdbProbe {
    pub fn new(command: CommandSpec, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

#[async_trait]
impl ConnectivityProbe for AdbProbe {
    async fn fetch_listing(&self) -> Result<String, ExecError> {
        let captured = exec::capture(&self.command, self.timeout).await?;
        if captured.exit_code != Some(0) {
            warn!(
                command = %self.command,
                exit_code = ?captured.exit_code,
                stderr = %captured.stderr.trim(),
                "Device listing command exited non-zero"
            );
        }
        Ok(captured.stdout)
    }
}
