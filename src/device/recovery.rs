//! Reconnect script trigger

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::RecoveryTrigger;
use crate::exec::{self, CommandSpec, Delivery, ExecError};

/// Runs the configured reconnect command once per call. No retries.
pub struct ScriptRecovery {
    command: CommandSpec,
    timeout: Duration,
}

impl ScriptRecovery {
    pub fn new(command: CommandSpec, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

#[async_trait]
impl RecoveryTrigger for ScriptRecovery {
    async fn recover(&self) -> Result<Delivery, ExecError> {
        info!(command = %self.command, "Running device recovery");
        exec::run(&self.command, self.timeout).await
    }
}
