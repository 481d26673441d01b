//! Built-in analyzer simulator.
//!
//! When the simulated port is the active endpoint, [`SimulatedTransmission`]
//! plays back a complete CBC run the way a hematology analyzer sends it:
//!
//! ```text
//!   start delay ─► ENQ ─► chunk delay ─► STX H P O R×35 L ETX ─► chunk delay ─► EOT ─► cooldown
//! ```
//!
//! The bytes are injected into the [`SimulatedTransport`], so they travel the
//! same framing, decoding and dispatch path as bytes from a real device.  At
//! most one transmission is in flight at a time; a run is abandoned as soon
//! as its cancellation token fires or the port stops being active.
//!
//! Each injection runs the whole receive chain synchronously, up to and
//! including the result sink's file write, so it is handed to Tokio's
//! blocking pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use lis_core::protocol::{CR, ENQ, EOT, ETX, STX};

use crate::application::manage_ports::PortRegistry;
use crate::infrastructure::storage::config::SimulationSection;
use crate::infrastructure::transport::simulated::SimulatedTransport;
use crate::infrastructure::transport::TransportPort;

const HEADER: &str = "1H|\\^&|||  71114BG^CDRuby^2.3 ML^1.0|||||||P|LIS2-A";
const PATIENT: &str = "P|1|||||||U|||||||^";
const TEST_ORDER: &str = "O|1|26804103|8958|^^^CBC^1^1|||||||||||Patient^||||||||||F";
const TERMINATOR: &str = "L|1|N";
const OPERATOR: &str = "Guest";
const STARTED_AT: &str = "20231005081747";
const INSTRUMENT: &str = "  71114BG";

/// (assay, value, status) for each canned result, in transmission order.
const RESULTS: [(&str, &str, &str); 35] = [
    ("WBC", "11.71", "W"),
    ("NEU", "8.648", "W"),
    ("LYM", "2.009", "W"),
    ("MONO", ".0118", "W"),
    ("EOS", ".4841", "W"),
    ("BASO", ".5580", "W"),
    ("RBC", ".9298", "W"),
    ("HGB", "17.92", "W"),
    ("HCT", "6.255", "W"),
    ("MCV", "67.27", "W"),
    ("MCH", "192.7", "W"),
    ("MCHC", "286.5", "W"),
    ("RDW", "24.85", "W"),
    ("PLT", ">>>>>", "W"),
    ("MPV", "14.69", "W"),
    ("PCT", "-----", "X"),
    ("PDW", "21.99", "W"),
    ("%N", "73.85", "W"),
    ("%L", "17.15", "W"),
    ("%M", ".1005", "W"),
    ("%E", "4.134", "W"),
    ("%B", "4.765", "F"),
    ("DFLT(N)", "FLAG", ""),
    ("DFLT(E)", "FLAG", ""),
    ("DFLT(L)", "FLAG", ""),
    ("IG", "FLAG", ""),
    ("BAND", "FLAG", ""),
    ("DFLT(M)", "FLAG", ""),
    ("WBC", "FLAG", ""),
    ("NRBC", "FLAG", ""),
    ("RRBC", "FLAG", ""),
    ("RBC MORPH", "FLAG", ""),
    ("LRI", "FLAG", ""),
    ("URI", "FLAG", ""),
    ("MCHC", "FLAG", ""),
];

/// Number of results in the canned message.
pub const CANNED_RESULT_COUNT: usize = RESULTS.len();

/// The canned message as record lines, without framing.
pub fn canned_records() -> Vec<String> {
    let mut lines = vec![HEADER.to_string(), PATIENT.to_string(), TEST_ORDER.to_string()];
    lines.extend(RESULTS.iter().enumerate().map(|(i, (assay, value, status))| {
        format!(
            "R|{}|^^^CBC^^^{assay}|{value}|||||{status}||{OPERATOR}|{STARTED_AT}||{INSTRUMENT}",
            i + 1
        )
    }));
    lines.push(TERMINATOR.to_string());
    lines
}

/// The canned message framed as one STX..ETX block with CR record separators.
pub fn canned_message() -> Vec<u8> {
    let mut bytes = vec![STX];
    for line in canned_records() {
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(CR);
    }
    bytes.push(ETX);
    bytes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationTiming {
    pub start_delay: Duration,
    pub chunk_delay: Duration,
    pub cooldown: Duration,
}

impl From<&SimulationSection> for SimulationTiming {
    fn from(section: &SimulationSection) -> Self {
        Self {
            start_delay: Duration::from_millis(section.start_delay_ms),
            chunk_delay: Duration::from_millis(section.chunk_delay_ms),
            cooldown: Duration::from_millis(section.cooldown_ms),
        }
    }
}

/// Why a transmission stopped early.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransmissionError {
    #[error("simulated transmission cancelled")]
    Cancelled,

    #[error("simulated port {0} is no longer active")]
    PortInactive(String),

    #[error("simulated send task failed: {0}")]
    SendTask(String),
}

/// Clears the in-flight flag however the transmission ends.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct SimulatedTransmission {
    registry: PortRegistry,
    port: Arc<SimulatedTransport>,
    timing: SimulationTiming,
    in_flight: Arc<AtomicBool>,
}

impl SimulatedTransmission {
    pub fn new(registry: PortRegistry, port: Arc<SimulatedTransport>, timing: SimulationTiming) -> Self {
        Self {
            registry,
            port,
            timing,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn port_name(&self) -> &str {
        self.port.name()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Spawns a transmission if the simulated port is active and none is
    /// already running.  Must be called from within a tokio runtime.
    pub fn try_start(&self, token: CancellationToken) -> Option<JoinHandle<Result<(), TransmissionError>>> {
        if !self.is_port_active() {
            return None;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        let this = self.clone();
        Some(tokio::spawn(async move {
            let _guard = InFlightGuard(Arc::clone(&this.in_flight));
            let result = this.transmit(&token).await;
            if let Err(e) = &result {
                debug!("{e}");
            }
            result
        }))
    }

    /// Plays back one full transmission on the current task.
    pub async fn transmit(&self, token: &CancellationToken) -> Result<(), TransmissionError> {
        self.pause(token, self.timing.start_delay).await?;

        self.send(vec![ENQ]).await?;
        self.pause(token, self.timing.chunk_delay).await?;

        self.send(canned_message()).await?;
        self.pause(token, self.timing.chunk_delay).await?;

        self.send(vec![EOT]).await?;
        info!(port = %self.port_name(), results = CANNED_RESULT_COUNT, "simulated transmission sent");

        self.pause(token, self.timing.cooldown).await
    }

    fn is_port_active(&self) -> bool {
        self.registry.active_port_name().as_deref() == Some(self.port_name())
    }

    async fn send(&self, bytes: Vec<u8>) -> Result<(), TransmissionError> {
        if !self.is_port_active() {
            return Err(TransmissionError::PortInactive(self.port_name().to_string()));
        }
        let port = Arc::clone(&self.port);
        tokio::task::spawn_blocking(move || port.inject(&bytes))
            .await
            .map_err(|e| TransmissionError::SendTask(e.to_string()))
    }

    async fn pause(&self, token: &CancellationToken, delay: Duration) -> Result<(), TransmissionError> {
        tokio::select! {
            _ = token.cancelled() => Err(TransmissionError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
