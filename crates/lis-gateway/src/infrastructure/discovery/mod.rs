//! Serial port discovery.
//!
//! [`PortWatcher`] periodically asks a [`PortEnumerator`] which serial
//! devices the host currently has and keeps the [`PortRegistry`] in step:
//!
//! - names that appeared since the last sweep are registered,
//! - names that vanished are removed (which closes them),
//! - *pinned* names, such as the simulated port, are never removed.
//!
//! A failure to enumerate or to register a single port is logged and the
//! loop carries on with the next sweep.
//!
//! When a [`simulation::SimulatedTransmission`] is attached, each sweep also
//! offers it the chance to start a demo transmission.
//!
//! Enumerating devices and closing a removed port (which joins its reader
//! thread) are blocking calls, so [`PortWatcher::run`] performs every sweep on
//! Tokio's blocking pool rather than on a runtime worker.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use lis_core::LinkConfig;

use crate::application::manage_ports::PortRegistry;
use crate::infrastructure::transport::serial::SerialTransport;
use crate::infrastructure::transport::TransportPort;

pub mod simulation;

use simulation::SimulatedTransmission;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(#[from] tokio_serial::Error),
}

/// Lists the host's endpoints and builds transports for them.
#[cfg_attr(test, mockall::automock)]
pub trait PortEnumerator: Send + Sync {
    fn available_ports(&self) -> Result<Vec<String>, DiscoveryError>;

    fn create_port(&self, name: &str) -> Arc<dyn TransportPort>;
}

/// Enumerates real serial devices through `tokio-serial`.
pub struct SerialPortEnumerator {
    link: LinkConfig,
}

impl SerialPortEnumerator {
    /// New transports are created with `link` settings.
    pub fn new(link: LinkConfig) -> Self {
        Self { link }
    }
}

impl PortEnumerator for SerialPortEnumerator {
    fn available_ports(&self) -> Result<Vec<String>, DiscoveryError> {
        Ok(tokio_serial::available_ports()?
            .into_iter()
            .map(|info| info.port_name)
            .collect())
    }

    fn create_port(&self, name: &str) -> Arc<dyn TransportPort> {
        Arc::new(SerialTransport::new(name, self.link))
    }
}

/// Names added and removed by one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The synchronous half of the watcher: one registry reconciliation.
struct Sweeper {
    registry: PortRegistry,
    enumerator: Arc<dyn PortEnumerator>,
    pinned: HashSet<String>,
}

impl Sweeper {
    fn sweep(&self) -> Result<SweepReport, DiscoveryError> {
        let available = self.enumerator.available_ports()?;
        let known = self.registry.port_names();
        let mut report = SweepReport::default();

        for name in available.iter().filter(|n| !known.contains(*n)) {
            match self.registry.add_or_update(self.enumerator.create_port(name)) {
                Ok(()) => report.added.push(name.clone()),
                Err(e) => error!(port = %name, "failed to register new port: {e}"),
            }
        }

        for name in known
            .iter()
            .filter(|n| !available.contains(*n) && !self.pinned.contains(*n))
        {
            if self.registry.remove(name) {
                report.removed.push(name.clone());
            }
        }

        Ok(report)
    }
}

pub struct PortWatcher {
    sweeper: Sweeper,
    poll_interval: Duration,
    simulation: Option<SimulatedTransmission>,
}

impl PortWatcher {
    pub fn new(
        registry: PortRegistry,
        enumerator: Arc<dyn PortEnumerator>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            sweeper: Sweeper {
                registry,
                enumerator,
                pinned: HashSet::new(),
            },
            poll_interval,
            simulation: None,
        }
    }

    /// Keeps `name` registered even when the enumerator does not list it.
    pub fn pin(mut self, name: impl Into<String>) -> Self {
        self.sweeper.pinned.insert(name.into());
        self
    }

    /// Offers `simulation` a chance to start on every sweep.  Pins its port.
    pub fn with_simulation(mut self, simulation: SimulatedTransmission) -> Self {
        self.sweeper.pinned.insert(simulation.port_name().to_string());
        self.simulation = Some(simulation);
        self
    }

    /// Reconciles the registry with the enumerator once, on the calling
    /// thread.
    pub fn poll_once(&self) -> Result<SweepReport, DiscoveryError> {
        self.sweeper.sweep()
    }

    /// Sweeps every poll interval until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        info!(interval_ms = self.poll_interval.as_millis() as u64, "port watcher started");
        let mut ticker = tokio::time::interval(self.poll_interval);
        let sweeper = Arc::new(self.sweeper);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(simulation) = &self.simulation {
                        if simulation.try_start(token.child_token()).is_some() {
                            debug!("simulated transmission started");
                        }
                    }
                    let sweeper = Arc::clone(&sweeper);
                    match tokio::task::spawn_blocking(move || sweeper.sweep()).await {
                        Ok(Ok(report)) if !report.is_empty() => {
                            info!(added = ?report.added, removed = ?report.removed, "serial ports changed");
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!("{e}"),
                        Err(e) => error!("port sweep task failed: {e}"),
                    }
                }
            }
        }

        info!("port watcher stopped");
    }
}
