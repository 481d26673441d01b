//! Byte-stream transports the gateway listens on.
//!
//! # Implementations
//!
//! - [`serial::SerialTransport`] – a physical serial line, opened through
//!   `tokio-serial`.  A dedicated reader thread pushes incoming bytes to the
//!   data handler as they arrive.
//! - [`simulated::SimulatedTransport`] – an in-memory port for tests and for
//!   driving the gateway without hardware.  Bytes are injected by the caller.
//!
//! # Notification model
//!
//! Transports report incoming bytes and status changes through two optional
//! callbacks installed with [`TransportPort::set_data_handler`] and
//! [`TransportPort::set_status_handler`].  When no data handler is installed,
//! incoming bytes are queued and can be fetched with [`TransportPort::read`].
//!
//! Callbacks are always invoked *without* any of the transport's internal
//! locks held, so a handler may call back into the transport (for example to
//! write an ACK).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lis_core::{LinkConfig, PortStatus};
use thiserror::Error;

pub mod serial;
pub mod simulated;

/// Receives every chunk of bytes read from the transport, in arrival order.
pub type DataHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Receives the new status whenever it actually changes.
pub type StatusHandler = Arc<dyn Fn(PortStatus) + Send + Sync>;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("port {0} is already open")]
    AlreadyOpen(String),

    #[error("port {0} is not open")]
    NotOpen(String),

    /// Link settings can only change while the port is closed.
    #[error("cannot change link settings of {0} while it is open")]
    ConfigWhileOpen(String),

    /// The operating system refused to open the device.
    #[error("failed to open port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// The device was opened but could not be prepared for use.
    #[error("serial error on port {port}: {source}")]
    Serial {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("I/O error on port {port}: {source}")]
    Io {
        port: String,
        #[source]
        source: std::io::Error,
    },
}

/// A byte-oriented, full-duplex channel to an analyzer.
///
/// All methods take `&self`; implementations use interior mutability so a
/// port can be shared as `Arc<dyn TransportPort>` between the registry, the
/// discovery task and the reader thread.
pub trait TransportPort: Send + Sync {
    /// The endpoint's identity, e.g. `/dev/ttyUSB0`, `COM3` or `SIMCOM1`.
    fn name(&self) -> &str;

    fn link_config(&self) -> LinkConfig;

    /// # Errors
    ///
    /// Returns [`TransportError::ConfigWhileOpen`] if the port is open.
    fn set_link_config(&self, config: LinkConfig) -> Result<(), TransportError>;

    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyOpen`] if the port is already open, or
    /// [`TransportError::Open`] if the device cannot be acquired.
    fn open(&self) -> Result<(), TransportError>;

    /// Closes the port.  Closing a closed port is a no-op.
    fn close(&self) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;

    fn status(&self) -> PortStatus;

    /// Returns up to `max_bytes` queued bytes.  May block for a bounded time
    /// waiting for data; returns an empty vector if none arrived.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotOpen`] if the port is closed.
    fn read(&self, max_bytes: usize) -> Result<Vec<u8>, TransportError>;

    /// Writes all of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotOpen`] if the port is closed, or
    /// [`TransportError::Io`] if the device write fails.
    fn write(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Installs (or with `None`, removes) the data-arrived callback.
    fn set_data_handler(&self, handler: Option<DataHandler>);

    /// Installs (or with `None`, removes) the status-changed callback.
    fn set_status_handler(&self, handler: Option<StatusHandler>);
}

/// Locks a mutex, recovering the data if a previous holder panicked.
///
/// Transport state stays consistent across a panicking callback because
/// callbacks never run while a lock is held.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Status and callback slots shared by every transport implementation.
#[derive(Default)]
pub(crate) struct PortSignals {
    status: Mutex<PortStatus>,
    data_handler: Mutex<Option<DataHandler>>,
    status_handler: Mutex<Option<StatusHandler>>,
}

impl PortSignals {
    pub(crate) fn status(&self) -> PortStatus {
        *lock(&self.status)
    }

    /// Updates the status and notifies the status handler if it changed.
    pub(crate) fn set_status(&self, status: PortStatus) {
        let changed = {
            let mut current = lock(&self.status);
            let changed = *current != status;
            *current = status;
            changed
        };
        if changed {
            let handler = lock(&self.status_handler).clone();
            if let Some(handler) = handler {
                handler(status);
            }
        }
    }

    pub(crate) fn data_handler(&self) -> Option<DataHandler> {
        lock(&self.data_handler).clone()
    }

    pub(crate) fn set_data_handler(&self, handler: Option<DataHandler>) {
        *lock(&self.data_handler) = handler;
    }

    pub(crate) fn set_status_handler(&self, handler: Option<StatusHandler>) {
        *lock(&self.status_handler) = handler;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_signals_start_offline() {
        let signals = PortSignals::default();
        assert_eq!(signals.status(), PortStatus::Offline);
    }

    #[test]
    fn test_status_handler_only_fires_on_change() {
        // Arrange
        let signals = PortSignals::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        signals.set_status_handler(Some(Arc::new(move |s| sink.lock().unwrap().push(s))));

        // Act
        signals.set_status(PortStatus::Connected);
        signals.set_status(PortStatus::Connected);
        signals.set_status(PortStatus::ReadingData);
        signals.set_status(PortStatus::ReadingData);

        // Assert
        assert_eq!(
            *seen.lock().unwrap(),
            vec![PortStatus::Connected, PortStatus::ReadingData]
        );
    }

    #[test]
    fn test_removed_status_handler_is_not_called() {
        let signals = PortSignals::default();
        let seen = Arc::new(Mutex::new(0u32));
        let sink = Arc::clone(&seen);
        signals.set_status_handler(Some(Arc::new(move |_| *sink.lock().unwrap() += 1)));
        signals.set_status_handler(None);

        signals.set_status(PortStatus::Connected);

        assert_eq!(*seen.lock().unwrap(), 0);
    }
}
