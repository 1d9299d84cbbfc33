//! External tool invocation
//!
//! Every interaction with the console's tooling (`adb`, the reconnect and
//! startup scripts, `grpcurl`) goes through this module. Commands are plain
//! argv vectors taken from configuration and are never passed through a shell.

use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Command is empty")]
    EmptyCommand,

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Delivery
// ============================================================================

/// Outcome of a best-effort external invocation.
///
/// The tool ran to completion in both cases. Only a zero exit status counts
/// as confirmation; callers that keep the lenient contract treat both
/// variants as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "delivery", rename_all = "snake_case")]
pub enum Delivery {
    /// Tool exited non-zero or was terminated by a signal.
    Dispatched { exit_code: Option<i32> },
    /// Tool exited with status 0.
    Confirmed,
}

impl Delivery {
    fn from_status(status: std::process::ExitStatus) -> Self {
        if status.success() {
            Delivery::Confirmed
        } else {
            Delivery::Dispatched {
                exit_code: status.code(),
            }
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Delivery::Confirmed)
    }
}

impl std::fmt::Display for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Confirmed => write!(f, "confirmed"),
            Delivery::Dispatched { exit_code: Some(code) } => {
                write!(f, "dispatched (exit code {})", code)
            }
            Delivery::Dispatched { exit_code: None } => write!(f, "dispatched (no exit code)"),
        }
    }
}

// ============================================================================
// Command Spec
// ============================================================================

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Build from a configured argv vector (`["adb", "devices"]`).
    pub fn from_argv(argv: &[String]) -> Result<Self, ExecError> {
        let (program, args) = argv.split_first().ok_or(ExecError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(ExecError::EmptyCommand);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

// ============================================================================
// Invocation
// ============================================================================

/// Captured output of a finished command.
#[derive(Debug, Clone)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Run a command to completion and capture its output.
///
/// The child is killed if `timeout` elapses first.
pub async fn capture(spec: &CommandSpec, timeout: Duration) -> Result<Captured, ExecError> {
    let child = spec
        .command()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ExecError::Timeout {
            program: spec.program.clone(),
            secs: timeout.as_secs(),
        })??;

    Ok(Captured {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code(),
    })
}

/// Run a command to completion, discarding stdout.
///
/// A non-zero exit is reported through [`Delivery`], not as an error.
pub async fn run(spec: &CommandSpec, timeout: Duration) -> Result<Delivery, ExecError> {
    let mut child = spec
        .command()
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    let waited = tokio::time::timeout(timeout, child.wait()).await;
    match waited {
        Ok(status) => Ok(Delivery::from_status(status?)),
        Err(_) => {
            let _ = child.kill().await;
            Err(ExecError::Timeout {
                program: spec.program.clone(),
                secs: timeout.as_secs(),
            })
        }
    }
}
