//! Treadmill Bridge - console control-plane
//!
//! # Usage
//!
//! ```bash
//! # Run with bridge_config.toml from the working directory (or defaults)
//! cargo run --release
//!
//! # Explicit config and bind address
//! ./treadmill-bridge --config /etc/treadmill/bridge_config.toml --addr 0.0.0.0:8000
//!
//! # One-shot device check
//! ./treadmill-bridge probe
//! ```
//!
//! # Environment Variables
//!
//! - `TREADMILL_CONFIG`: Path to the TOML config file
//! - `TREADMILL_SERVER_ADDR`: HTTP bind address override
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use treadmill_bridge::api::{create_app, ApiState};
use treadmill_bridge::background::ConnectivitySupervisor;
use treadmill_bridge::config::BridgeConfig;
use treadmill_bridge::device::{self, AdbProbe, ScriptRecovery};
use treadmill_bridge::speed::{GrpcurlSender, SpeedDispatcher};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "treadmill-bridge")]
#[command(about = "Treadmill console bridge: speed relay and device connectivity supervisor")]
#[command(version)]
struct CliArgs {
    /// Path to a bridge_config.toml (takes precedence over TREADMILL_CONFIG)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the server address (default: "0.0.0.0:8000")
    #[arg(short, long)]
    addr: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Skip the one-time startup procedure
    #[arg(long)]
    skip_startup: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Probe the device once, print the verdict and exit
    Probe,
    /// Load and validate the configuration, print the effective TOML and exit
    CheckConfig,
}

// ============================================================================
// Logging
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Task Names for Task Monitor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    ConnectivitySupervisor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::ConnectivitySupervisor => write!(f, "ConnectivitySupervisor"),
        }
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Build the supervisor and dispatcher from configuration.
fn build_services(config: &BridgeConfig) -> Result<(ConnectivitySupervisor, SpeedDispatcher)> {
    let probe = AdbProbe::new(
        config.device.probe_command().context("Invalid device.probe_command")?,
        config.device.command_timeout(),
    );
    let recovery = ScriptRecovery::new(
        config
            .device
            .recovery_command()
            .context("Invalid device.recovery_command")?,
        config.device.command_timeout(),
    );
    let supervisor = ConnectivitySupervisor::new(
        Arc::new(probe),
        Arc::new(recovery),
        config.supervisor.interval(),
    );
    let dispatcher = SpeedDispatcher::new(Arc::new(GrpcurlSender::new(config.speed.clone())));
    Ok((supervisor, dispatcher))
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Spawn the connectivity loop into the JoinSet.
fn spawn_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    supervisor: ConnectivitySupervisor,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[ConnectivitySupervisor] Task starting");
        supervisor.run(cancel_token).await;
        Ok(TaskName::ConnectivitySupervisor)
    });
}

/// Monitor spawned tasks; cancel everything when one fails.
async fn monitor_tasks(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Shutdown signal received, waiting for tasks");
                while let Some(result) = task_set.join_next().await {
                    if let Ok(Ok(task_name)) = result {
                        info!("Task {} stopped", task_name);
                    }
                }
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("All tasks completed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

async fn run_bridge(config: BridgeConfig, skip_startup: bool) -> Result<()> {
    if skip_startup {
        info!("Startup procedure skipped (--skip-startup)");
    } else if let Some(cmd) = config.device.startup_command() {
        device::run_startup(&cmd, config.device.startup_timeout()).await;
    } else {
        info!("No startup procedure configured");
    }

    let (supervisor, dispatcher) = build_services(&config)?;

    let state = ApiState::new(supervisor.clone(), dispatcher)
        .with_speed_failure_reporting(config.speed.report_failures);
    let app = create_app(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.addr))?;
    info!("HTTP server listening on http://{}", config.server.addr);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    spawn_supervisor(&mut task_set, supervisor, cancel_token.clone());

    monitor_tasks(&mut task_set, cancel_token).await
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.json_logs);

    let (mut config, provenance) =
        BridgeConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.apply_overrides(args.addr);
    config.validate().context("Invalid configuration")?;

    match args.command {
        Some(SubCommand::CheckConfig) => {
            match &provenance.source {
                Some(path) => info!(path = %path.display(), keys = provenance.explicit_keys.len(), "Configuration is valid"),
                None => info!("Configuration is valid (built-in defaults)"),
            }
            println!("{}", config.to_toml()?);
            return Ok(());
        }
        Some(SubCommand::Probe) => {
            let (supervisor, _) = build_services(&config)?;
            let state = supervisor.query_status().await;
            println!("{}", state);
            return Ok(());
        }
        None => {}
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        interval_secs = config.supervisor.interval_secs,
        speed_target = %config.speed.target,
        "Treadmill bridge starting"
    );

    run_bridge(config, args.skip_startup).await?;

    info!("Treadmill bridge shutdown complete");
    Ok(())
}
