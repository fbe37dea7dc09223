//! raspi-off - Main Entry Point
//!
//! Listens for MQTT messages and shuts down or reboots the host based on the topic.

use clap::Parser;
use raspi_off::config::{CliOverrides, DaemonConfig};
use raspi_off::dispatch::{ActionDispatcher, SystemCommandRunner};
use raspi_off::error::{DaemonError, DaemonResult};
use raspi_off::identity::resolve_identity;
use raspi_off::observability::{init_logging, LoggingConfig};
use raspi_off::transport::mqtt::ConnectionSupervisor;
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, Instrument};

/// Remote Shutdown and Reboot service for Raspberry Pi
///
/// raspi-off is a service that allows you to remotely shutdown or reboot your
/// Raspberry Pi. It listens for MQTT messages and executes the appropriate
/// command based on the topic.
#[derive(Parser)]
#[command(name = "raspi-off")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Debug output
    #[arg(short, long)]
    debug: bool,

    /// The full URL of the MQTT server to connect to [default: tcp://mqtt.local:1883]
    #[arg(short, long, env = "RASPI_OFF_SERVER")]
    server: Option<String>,

    /// Base topic to subscribe to [default: raspi-off]
    #[arg(short = 't', long, env = "RASPI_OFF_BASE_TOPIC")]
    base_topic: Option<String>,

    /// The QoS to subscribe to messages at [default: 1]
    #[arg(short, long, env = "RASPI_OFF_QOS", value_parser = clap::value_parser!(u8).range(0..=2))]
    qos: Option<u8>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Exit instead of reconnecting when the broker rejects a subscription
    #[arg(long)]
    fail_fast: bool,

    /// Executable invoked for reboot and power-off [default: shutdown]
    #[arg(long, value_name = "PROGRAM")]
    shutdown_command: Option<String>,

    /// Ceiling for the reconnection backoff, in seconds [default: unbounded]
    #[arg(long, value_name = "SECS")]
    max_reconnect_interval: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            server: self.server.clone(),
            base_topic: self.base_topic.clone(),
            qos: self.qos,
            fail_fast: self.fail_fast,
            shutdown_command: self.shutdown_command.clone(),
            max_reconnect_interval_secs: self.max_reconnect_interval,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(LoggingConfig::from_flags(cli.verbose, cli.debug));

    info!("Starting raspi-off service v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(config)
        .instrument(raspi_off::lifecycle_span!("run"))
        .await
    {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(cli: &Cli) -> DaemonResult<DaemonConfig> {
    let base = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            DaemonConfig::load_from_file(path)?
        }
        None => DaemonConfig::default(),
    };

    let config = base.with_overrides(cli.overrides());
    config.validate()?;
    Ok(config)
}

async fn run(config: DaemonConfig) -> DaemonResult<()> {
    let client_id = resolve_identity();

    let runner = SystemCommandRunner::new(config.daemon.shutdown_command.clone());
    let (dispatcher, worker) = ActionDispatcher::new(runner).spawn();
    let supervisor = ConnectionSupervisor::new(&client_id, &config, dispatcher)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor_task = tokio::spawn(supervisor.run(shutdown_rx));

    let mut sigint =
        signal::unix::signal(signal::unix::SignalKind::interrupt()).map_err(DaemonError::Signal)?;
    let mut sigterm =
        signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(DaemonError::Signal)?;

    let supervisor_result = tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
            None
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
            None
        }
        result = &mut supervisor_task => Some(result),
    };

    let supervisor_result = match supervisor_result {
        Some(result) => result,
        None => {
            let _ = shutdown_tx.send(true);
            supervisor_task.await
        }
    };

    // In-flight host commands finish before exit
    if let Err(e) = worker.await {
        error!("Dispatcher task ended abnormally: {}", e);
    }

    match supervisor_result {
        Ok(result) => result.map_err(DaemonError::from),
        Err(e) => Err(DaemonError::internal_error(format!(
            "MQTT supervisor task failed: {e}"
        ))),
    }
}
