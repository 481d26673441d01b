//! In-memory transport for tests and hardware-free operation.
//!
//! Bytes are pushed in with [`SimulatedTransport::inject`].  If a data handler is
//! installed it is called directly on the injecting thread, exactly as a real
//! port's reader thread would call it; otherwise the bytes are queued for
//! [`TransportPort::read`].  Everything written to the port is recorded and
//! can be inspected with [`SimulatedTransport::take_written`].

use std::collections::VecDeque;
use std::sync::Mutex;

use lis_core::{LinkConfig, PortStatus};
use tracing::debug;

use super::{lock, DataHandler, PortSignals, StatusHandler, TransportError, TransportPort};

/// Name under which the development simulator registers its port.
pub const DEFAULT_SIMULATED_PORT_NAME: &str = "SIMCOM1";

#[derive(Default)]
struct SimulatedState {
    open: bool,
    incoming: VecDeque<u8>,
    written: Vec<u8>,
}

pub struct SimulatedTransport {
    name: String,
    link: Mutex<LinkConfig>,
    state: Mutex<SimulatedState>,
    signals: PortSignals,
}

impl SimulatedTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: Mutex::new(LinkConfig::default()),
            state: Mutex::new(SimulatedState::default()),
            signals: PortSignals::default(),
        }
    }

    /// Delivers `data` as if it had arrived on the wire.
    ///
    /// Calls the data handler when one is installed, otherwise queues the
    /// bytes for polling reads.  Works whether or not the port is open.
    pub fn inject(&self, data: &[u8]) {
        match self.signals.data_handler() {
            Some(handler) => handler(data),
            None => {
                debug!(port = %self.name, bytes = data.len(), "queued simulated input");
                lock(&self.state).incoming.extend(data.iter().copied());
            }
        }
    }

    /// Returns and clears everything written to the port so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.state).written)
    }

    /// Number of injected bytes waiting for a read.
    pub fn queued_len(&self) -> usize {
        lock(&self.state).incoming.len()
    }
}

impl TransportPort for SimulatedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn link_config(&self) -> LinkConfig {
        *lock(&self.link)
    }

    fn set_link_config(&self, config: LinkConfig) -> Result<(), TransportError> {
        if self.is_open() {
            return Err(TransportError::ConfigWhileOpen(self.name.clone()));
        }
        *lock(&self.link) = config;
        Ok(())
    }

    fn open(&self) -> Result<(), TransportError> {
        {
            let mut state = lock(&self.state);
            if state.open {
                return Err(TransportError::AlreadyOpen(self.name.clone()));
            }
            state.open = true;
        }
        self.signals.set_status(PortStatus::Connected);
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        lock(&self.state).open = false;
        self.signals.set_status(PortStatus::Offline);
        Ok(())
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    fn status(&self) -> PortStatus {
        self.signals.status()
    }

    fn read(&self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        let data = {
            let mut state = lock(&self.state);
            if !state.open {
                return Err(TransportError::NotOpen(self.name.clone()));
            }
            let n = max_bytes.min(state.incoming.len());
            state.incoming.drain(..n).collect::<Vec<u8>>()
        };
        self.signals.set_status(PortStatus::ReadingData);
        Ok(data)
    }

    fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        {
            let mut state = lock(&self.state);
            if !state.open {
                return Err(TransportError::NotOpen(self.name.clone()));
            }
            state.written.extend_from_slice(data);
        }
        self.signals.set_status(PortStatus::WritingData);
        Ok(())
    }

    fn set_data_handler(&self, handler: Option<DataHandler>) {
        self.signals.set_data_handler(handler);
    }

    fn set_status_handler(&self, handler: Option<StatusHandler>) {
        self.signals.set_status_handler(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lis_core::{DataBits, Parity, StopBits};
    use std::sync::Arc;

    #[test]
    fn test_new_port_is_closed_with_default_link() {
        // Arrange / Act
        let port = SimulatedTransport::new(DEFAULT_SIMULATED_PORT_NAME);

        // Assert
        assert_eq!(port.name(), "SIMCOM1");
        assert!(!port.is_open());
        assert_eq!(port.status(), PortStatus::Offline);
        let link = port.link_config();
        assert_eq!(link.baud_rate, 9600);
        assert_eq!(link.parity, Parity::None);
        assert_eq!(link.data_bits, DataBits::Eight);
        assert_eq!(link.stop_bits, StopBits::One);
    }

    #[test]
    fn test_open_twice_fails() {
        // Arrange
        let port = SimulatedTransport::new("SIM");
        port.open().expect("first open succeeds");

        // Act
        let result = port.open();

        // Assert
        assert!(matches!(result, Err(TransportError::AlreadyOpen(name)) if name == "SIM"));
    }

    #[test]
    fn test_read_on_closed_port_fails() {
        let port = SimulatedTransport::new("SIM");
        assert!(matches!(port.read(16), Err(TransportError::NotOpen(_))));
    }

    #[test]
    fn test_injected_bytes_are_queued_without_handler() {
        // Arrange
        let port = SimulatedTransport::new("SIM");
        port.open().unwrap();

        // Act
        port.inject(b"L|1|N");
        let first = port.read(3).unwrap();
        let rest = port.read(100).unwrap();

        // Assert
        assert_eq!(first, b"L|1");
        assert_eq!(rest, b"|N");
        assert_eq!(port.queued_len(), 0);
    }

    #[test]
    fn test_injected_bytes_go_to_handler_when_installed() {
        // Arrange
        let port = SimulatedTransport::new("SIM");
        let received = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
        let sink = Arc::clone(&received);
        port.set_data_handler(Some(Arc::new(move |chunk: &[u8]| {
            sink.lock().unwrap().push(chunk.to_vec())
        })));

        // Act
        port.inject(&[0x05]);
        port.inject(b"H|\\^&");

        // Assert
        assert_eq!(*received.lock().unwrap(), vec![vec![0x05], b"H|\\^&".to_vec()]);
        assert_eq!(port.queued_len(), 0);
    }

    #[test]
    fn test_writes_are_recorded() {
        let port = SimulatedTransport::new("SIM");
        port.open().unwrap();

        port.write(&[0x06]).unwrap();
        port.write(&[0x06]).unwrap();

        assert_eq!(port.take_written(), vec![0x06, 0x06]);
        assert!(port.take_written().is_empty());
    }

    #[test]
    fn test_write_on_closed_port_fails() {
        let port = SimulatedTransport::new("SIM");
        assert!(matches!(port.write(&[0x06]), Err(TransportError::NotOpen(_))));
    }

    #[test]
    fn test_status_follows_lifecycle() {
        // Arrange
        let port = SimulatedTransport::new("SIM");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        port.set_status_handler(Some(Arc::new(move |s| sink.lock().unwrap().push(s))));

        // Act
        port.open().unwrap();
        port.write(&[0x06]).unwrap();
        port.read(1).unwrap();
        port.close().unwrap();

        // Assert
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                PortStatus::Connected,
                PortStatus::WritingData,
                PortStatus::ReadingData,
                PortStatus::Offline,
            ]
        );
    }

    #[test]
    fn test_link_config_cannot_change_while_open() {
        // Arrange
        let port = SimulatedTransport::new("SIM");
        let fast = LinkConfig {
            baud_rate: 115_200,
            ..LinkConfig::default()
        };

        // Act / Assert
        port.set_link_config(fast).expect("closed port accepts new settings");
        assert_eq!(port.link_config().baud_rate, 115_200);
        port.open().unwrap();
        assert!(matches!(
            port.set_link_config(LinkConfig::default()),
            Err(TransportError::ConfigWhileOpen(_))
        ));
    }
}
