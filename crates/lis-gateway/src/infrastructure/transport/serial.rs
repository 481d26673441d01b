//! Serial-line transport backed by `tokio-serial`.
//!
//! The device is opened with the blocking `serialport` API that `tokio-serial`
//! re-exports, then split with `try_clone` into a writer (kept behind a mutex)
//! and a reader owned by a dedicated thread.  The reader thread blocks in
//! `read` with a short timeout so it can notice a close request promptly.
//!
//! Each successful read is one chunk: it goes straight to the data handler if
//! one is installed, otherwise it is appended to an internal queue that
//! [`TransportPort::read`] drains.
//!
//! A hard read error stops the reader thread and takes the port offline.
//! From then on the port reports itself closed, and the next `open` releases
//! the dead device handle before acquiring a fresh one.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lis_core::{DataBits, LinkConfig, Parity, PortStatus, StopBits};
use tokio_serial::SerialPort;
use tracing::{debug, error, info, warn};

use super::{lock, DataHandler, PortSignals, StatusHandler, TransportError, TransportPort};

/// How long a blocking device read waits before re-checking the running flag.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

const READ_BUFFER_SIZE: usize = 4096;

struct ReaderThread {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ReaderThread {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops the thread and waits for it, unless called from the thread itself.
    fn stop(self, port: &str) {
        self.running.store(false, Ordering::SeqCst);
        // A handler running on the reader thread may close the port; it
        // cannot join itself.
        if self.handle.thread().id() != thread::current().id() && self.handle.join().is_err() {
            warn!(port = %port, "serial reader thread panicked");
        }
    }
}

#[derive(Default)]
struct OpenState {
    writer: Option<Box<dyn SerialPort>>,
    reader: Option<ReaderThread>,
}

impl OpenState {
    /// Open means a device handle plus a reader thread that is still running.
    fn is_open(&self) -> bool {
        self.writer.is_some() && self.reader.as_ref().is_some_and(ReaderThread::is_running)
    }

    /// Releases the handle of a port whose reader stopped after a device error.
    fn take_stale(&mut self) -> Option<ReaderThread> {
        if self.reader.as_ref().is_some_and(|r| !r.is_running()) {
            self.writer = None;
            self.reader.take()
        } else {
            None
        }
    }
}

/// Bytes received while no data handler was installed.
#[derive(Default)]
struct IncomingQueue {
    bytes: Mutex<VecDeque<u8>>,
    ready: Condvar,
}

pub struct SerialTransport {
    name: String,
    link: Mutex<LinkConfig>,
    state: Mutex<OpenState>,
    incoming: Arc<IncomingQueue>,
    signals: Arc<PortSignals>,
}

impl SerialTransport {
    pub fn new(name: impl Into<String>, link: LinkConfig) -> Self {
        Self {
            name: name.into(),
            link: Mutex::new(link),
            state: Mutex::new(OpenState::default()),
            incoming: Arc::new(IncomingQueue::default()),
            signals: Arc::new(PortSignals::default()),
        }
    }

    fn io_error(&self, source: std::io::Error) -> TransportError {
        TransportError::Io {
            port: self.name.clone(),
            source,
        }
    }
}

fn to_serial_data_bits(bits: DataBits) -> tokio_serial::DataBits {
    match bits {
        DataBits::Five => tokio_serial::DataBits::Five,
        DataBits::Six => tokio_serial::DataBits::Six,
        DataBits::Seven => tokio_serial::DataBits::Seven,
        DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

fn to_serial_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

fn to_serial_stop_bits(bits: StopBits) -> tokio_serial::StopBits {
    match bits {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
    }
}

/// Body of the reader thread.  Runs until `running` is cleared or the device
/// reports a hard error.
fn read_loop(
    name: String,
    mut reader: Box<dyn SerialPort>,
    running: Arc<AtomicBool>,
    incoming: Arc<IncomingQueue>,
    signals: Arc<PortSignals>,
) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    while running.load(Ordering::SeqCst) {
        match reader.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => {
                signals.set_status(PortStatus::ReadingData);
                let chunk = &buf[..n];
                match signals.data_handler() {
                    Some(handler) => handler(chunk),
                    None => {
                        lock(&incoming.bytes).extend(chunk.iter().copied());
                        incoming.ready.notify_all();
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => {
                continue
            }
            Err(e) => {
                error!(port = %name, "serial read failed: {e}");
                running.store(false, Ordering::SeqCst);
                signals.set_status(PortStatus::Offline);
                break;
            }
        }
    }
    debug!(port = %name, "serial reader thread exiting");
}

impl TransportPort for SerialTransport {
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
        let mut state = lock(&self.state);
        if state.is_open() {
            return Err(TransportError::AlreadyOpen(self.name.clone()));
        }
        if let Some(stale) = state.take_stale() {
            debug!(port = %self.name, "releasing port left behind by a failed reader");
            stale.stop(&self.name);
        }

        let link = self.link_config();
        let port = tokio_serial::new(self.name.as_str(), link.baud_rate)
            .data_bits(to_serial_data_bits(link.data_bits))
            .parity(to_serial_parity(link.parity))
            .stop_bits(to_serial_stop_bits(link.stop_bits))
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| TransportError::Open {
                port: self.name.clone(),
                source,
            })?;
        let reader = port.try_clone().map_err(|source| TransportError::Serial {
            port: self.name.clone(),
            source,
        })?;

        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let name = self.name.clone();
            let running = Arc::clone(&running);
            let incoming = Arc::clone(&self.incoming);
            let signals = Arc::clone(&self.signals);
            thread::Builder::new()
                .name(format!("serial-reader-{}", self.name))
                .spawn(move || read_loop(name, reader, running, incoming, signals))
                .map_err(|e| self.io_error(e))?
        };

        state.writer = Some(port);
        state.reader = Some(ReaderThread { running, handle });
        drop(state);

        info!(port = %self.name, settings = %link, "serial port opened");
        self.signals.set_status(PortStatus::Connected);
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        let (writer, reader) = {
            let mut state = lock(&self.state);
            (state.writer.take(), state.reader.take())
        };
        if writer.is_none() {
            return Ok(());
        }
        drop(writer);

        if let Some(reader) = reader {
            reader.stop(&self.name);
        }

        info!(port = %self.name, "serial port closed");
        self.signals.set_status(PortStatus::Offline);
        Ok(())
    }

    fn is_open(&self) -> bool {
        lock(&self.state).is_open()
    }

    fn status(&self) -> PortStatus {
        self.signals.status()
    }

    fn read(&self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen(self.name.clone()));
        }
        let queue = lock(&self.incoming.bytes);
        let (mut queue, _) = self
            .incoming
            .ready
            .wait_timeout_while(queue, READ_TIMEOUT, |q| q.is_empty())
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let n = max_bytes.min(queue.len());
        let data: Vec<u8> = queue.drain(..n).collect();
        drop(queue);

        if !data.is_empty() {
            self.signals.set_status(PortStatus::ReadingData);
        }
        Ok(data)
    }

    fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        {
            let mut state = lock(&self.state);
            if !state.is_open() {
                return Err(TransportError::NotOpen(self.name.clone()));
            }
            let writer = state
                .writer
                .as_mut()
                .ok_or_else(|| TransportError::NotOpen(self.name.clone()))?;
            writer.write_all(data).map_err(|e| self.io_error(e))?;
            writer.flush().map_err(|e| self.io_error(e))?;
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

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(port = %self.name, "failed to close serial port on drop: {e}");
        }
    }
}
