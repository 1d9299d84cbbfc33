//! `grpcurl`-backed speed sender
//!
//! The console's speed service speaks gRPC over mutual TLS on a local port.
//! Calls go through `grpcurl` with the protoset and key material shipped
//! alongside the bridge.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::RemoteCommandSender;
use crate::config::SpeedConfig;
use crate::exec::{self, CommandSpec, Delivery, ExecError};

pub struct GrpcurlSender {
    config: SpeedConfig,
    timeout: Duration,
}

impl GrpcurlSender {
    pub fn new(config: SpeedConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        Self { config, timeout }
    }

    /// Build the full invocation for one `SetSpeed` call.
    pub fn command_for(&self, kph: f64) -> CommandSpec {
        let c = &self.config;
        let payload = serde_json::json!({ "kph": kph }).to_string();

        let mut cmd = CommandSpec::new(&c.grpcurl_path)
            .arg("-H")
            .arg(format!("client_id: {}", c.client_id));
        if c.insecure {
            cmd = cmd.arg("-insecure");
        }
        cmd.arg("-protoset")
            .arg(&c.protoset)
            .arg("-cert")
            .arg(&c.cert)
            .arg("-key")
            .arg(&c.key)
            .arg("-cacert")
            .arg(&c.ca_cert)
            .arg("-d")
            .arg(payload)
            .arg(&c.target)
            .arg(&c.method)
    }
}

#[async_trait]
impl RemoteCommandSender for GrpcurlSender {
    async fn send_speed(&self, kph: f64) -> Result<Delivery, ExecError> {
        let cmd = self.command_for(kph);
        debug!(target_addr = %self.config.target, method = %self.config.method, kph, "Sending SetSpeed");
        exec::run(&cmd, self.timeout).await
    }
}
