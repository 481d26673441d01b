//! LIS gateway: entry point.
//!
//! Listens to a hematology analyzer on a serial line, acknowledges its LIS2-A
//! transmissions, and stores every result it can correlate with a specimen.
//!
//! # Usage
//!
//! ```text
//! lis-gateway [OPTIONS]
//!
//! Options:
//!   --config <PATH>   Configuration file [default: lis-gateway.toml]
//!   --port <NAME>     Serial port to activate and open at start-up
//!   --simulate        Register the simulated analyzer port and replay demo runs
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Description                          |
//! |-----------------------|--------------------------------------|
//! | `LIS_GATEWAY_CONFIG`  | Configuration file path              |
//! | `LIS_GATEWAY_PORT`    | Serial port to activate at start-up  |
//! | `RUST_LOG`            | Overrides `gateway.log_level`        |
//!
//! # Architecture overview
//!
//! ```text
//! analyzer ──serial──► TransportPort ──chunks──► PortRegistry (active port only)
//!                                                   │ FrameAssembler (ENQ/EOT, ACK)
//!                                                   ▼
//!                                             RecordDispatcher ──► JsonLinesResultSink
//!                                                   │
//!                                             StatisticsTracker
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use lis_gateway::application::dispatch_records::RecordDispatcher;
use lis_gateway::application::manage_ports::{PortRegistry, RegistryEvent};
use lis_gateway::application::track_statistics::StatisticsTracker;
use lis_gateway::infrastructure::discovery::simulation::SimulatedTransmission;
use lis_gateway::infrastructure::discovery::{PortWatcher, SerialPortEnumerator};
use lis_gateway::infrastructure::storage::config::{load_config, GatewayConfig};
use lis_gateway::infrastructure::storage::result_sink::JsonLinesResultSink;
use lis_gateway::infrastructure::transport::simulated::SimulatedTransport;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Hematology analyzer to LIS gateway.
#[derive(Debug, Parser)]
#[command(
    name = "lis-gateway",
    about = "Receives LIS2-A results from a hematology analyzer and stores them",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.  Defaults apply if it is missing.
    #[arg(long, default_value = "lis-gateway.toml", env = "LIS_GATEWAY_CONFIG")]
    config: PathBuf,

    /// Serial port to activate and open at start-up (e.g. `/dev/ttyUSB0`, `COM3`).
    #[arg(long, env = "LIS_GATEWAY_PORT")]
    port: Option<String>,

    /// Enable the simulated analyzer regardless of the configuration file.
    #[arg(long)]
    simulate: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<GatewayConfig> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("failed to load config from {}", self.config.display()))?;
        if self.simulate {
            config.simulation.enabled = true;
        }
        Ok(config)
    }

    /// The port to activate at start-up: `--port` if given, otherwise the
    /// simulated port when simulation is on.
    fn startup_port(&self, config: &GatewayConfig) -> Option<String> {
        self.port.clone().or_else(|| {
            config
                .simulation
                .enabled
                .then(|| config.simulation.port_name.clone())
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.gateway.log_level)),
        )
        .init();

    info!(
        client = %config.gateway.client_name,
        link = %config.link,
        sink = %config.sink.path.display(),
        "LIS gateway starting"
    );

    // ── Wiring ────────────────────────────────────────────────────────────────
    let statistics = Arc::new(StatisticsTracker::new());
    let sink = Arc::new(
        JsonLinesResultSink::open(&config.sink.path)
            .with_context(|| format!("failed to open result file {}", config.sink.path.display()))?,
    );
    let dispatcher = Arc::new(RecordDispatcher::new(
        config.dispatcher_config(),
        sink,
        Arc::clone(&statistics),
    ));
    let registry = PortRegistry::new(dispatcher, config.gateway.ack_policy);
    tokio::spawn(log_registry_events(registry.clone()));

    let mut watcher = PortWatcher::new(
        registry.clone(),
        Arc::new(SerialPortEnumerator::new(config.link)),
        config.discovery.poll_interval(),
    );

    if config.simulation.enabled {
        let port = Arc::new(SimulatedTransport::new(config.simulation.port_name.clone()));
        registry
            .add_or_update(port.clone())
            .context("failed to register simulated port")?;
        watcher = watcher.with_simulation(SimulatedTransmission::new(
            registry.clone(),
            port,
            (&config.simulation).into(),
        ));
        info!(port = %config.simulation.port_name, "simulated analyzer enabled");
    }

    // Sweep once up front so `--port` can name a device that is plugged in.
    match watcher.poll_once() {
        Ok(report) => debug!(ports = ?report.added, "initial port scan"),
        Err(e) => warn!("initial port scan failed: {e}"),
    }

    if let Some(name) = cli.startup_port(&config) {
        registry
            .set_active(&name)
            .with_context(|| format!("cannot activate port {name}"))?;
        registry
            .open_active()
            .with_context(|| format!("cannot open port {name}"))?;
    } else {
        info!(available = ?registry.port_names(), "no port selected; pass --port to start listening");
    }

    // ── Background tasks ──────────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let watcher_task = tokio::spawn(watcher.run(shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C signal")?;
    info!("received Ctrl+C, initiating graceful shutdown");

    shutdown.cancel();
    if let Err(e) = watcher_task.await {
        warn!("port watcher task failed: {e}");
    }
    if registry.active_port_name().is_some() {
        if let Err(e) = registry.close_active() {
            warn!("failed to close active port: {e}");
        }
    }

    let totals = statistics.snapshot();
    info!(
        records_read = totals.records_read,
        records_written = totals.records_written,
        database_errors = totals.database_errors,
        "LIS gateway stopped"
    );
    Ok(())
}

/// Logs every registry event until the registry is dropped.
async fn log_registry_events(registry: PortRegistry) {
    let mut events = registry.subscribe();
    drop(registry);
    loop {
        match events.recv().await {
            Ok(RegistryEvent::ActivePortChanged { previous, current }) => {
                info!(?previous, ?current, "active port changed");
            }
            Ok(RegistryEvent::StatusChanged { port, status }) => {
                info!(port = %port, %status, "port status");
            }
            Err(RecvError::Lagged(missed)) => warn!(missed, "registry events dropped"),
            Err(RecvError::Closed) => break,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
