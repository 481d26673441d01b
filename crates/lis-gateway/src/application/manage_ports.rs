//! PortRegistry: the set of known endpoints and the single active one.
//!
//! # Responsibilities
//!
//! - Keep a name → transport map that discovery adds to and removes from.
//! - Track which endpoint is *active*.  Only the active endpoint's bytes reach
//!   the [`FrameAssembler`]; bytes from any other endpoint are ignored.
//! - Feed completed messages to the [`RecordDispatcher`] and answer chunks
//!   with ACK according to the configured [`AckPolicy`].
//! - Publish [`RegistryEvent`]s when the active endpoint or its status
//!   changes.
//!
//! # Locking
//!
//! The map sits behind an `RwLock`; the active session (name + assembler)
//! behind a `Mutex`.  Handlers installed on a transport hold only a `Weak`
//! reference to the registry, and the map and session locks are released
//! before a transport method or the dispatcher is called, so a transport may
//! invoke its handler from inside its own call stack without deadlocking.
//!
//! Every change of the active endpoint, together with moving the handlers,
//! runs under a third `activation` mutex.  Concurrent `set_active`,
//! `add_or_update` and `remove` calls therefore cannot leave the active
//! endpoint without a handler.  The chunk and status callbacks never take it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use lis_core::protocol::ACK;
use lis_core::PortStatus;

use crate::infrastructure::transport::{TransportError, TransportPort};

use super::assemble_frames::{AckPolicy, ChunkOutcome, FrameAssembler};
use super::dispatch_records::RecordDispatcher;

const EVENT_CHANNEL_CAPACITY: usize = 64;

// ── Events & errors ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// Fired exactly once per effective activation switch.
    ActivePortChanged {
        previous: Option<String>,
        current: Option<String>,
    },
    /// The active endpoint reported a new status.
    StatusChanged { port: String, status: PortStatus },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("port name must not be empty")]
    EmptyPortName,

    #[error("Port {0} not found")]
    UnknownPort(String),

    #[error("no port is active")]
    NoActivePort,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

// ── Registry ──────────────────────────────────────────────────────────────────

struct Session {
    active: Option<String>,
    assembler: FrameAssembler,
}

struct RegistryInner {
    ports: RwLock<HashMap<String, Arc<dyn TransportPort>>>,
    session: Mutex<Session>,
    activation: Mutex<()>,
    dispatcher: Arc<RecordDispatcher>,
    ack_policy: AckPolicy,
    events: broadcast::Sender<RegistryEvent>,
}

/// Shared handle to the endpoint registry.  Cloning is cheap.
#[derive(Clone)]
pub struct PortRegistry {
    inner: Arc<RegistryInner>,
}

impl PortRegistry {
    pub fn new(dispatcher: Arc<RecordDispatcher>, ack_policy: AckPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RegistryInner {
                ports: RwLock::new(HashMap::new()),
                session: Mutex::new(Session {
                    active: None,
                    assembler: FrameAssembler::new(),
                }),
                activation: Mutex::new(()),
                dispatcher,
                ack_policy,
                events,
            }),
        }
    }

    /// Registers `port` under its name, replacing any previous entry.
    ///
    /// Replacing the active endpoint moves the handlers to the new instance.
    pub fn add_or_update(&self, port: Arc<dyn TransportPort>) -> Result<(), RegistryError> {
        let name = port.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyPortName);
        }

        let _activation = self.inner.lock_activation();
        let previous = self.inner.write_ports().insert(name.clone(), Arc::clone(&port));
        if self.active_port_name().as_deref() == Some(name.as_str()) {
            if let Some(previous) = previous {
                detach(previous.as_ref());
            }
            attach(&self.inner, port.as_ref());
        }
        debug!(port = %name, "port registered");
        Ok(())
    }

    pub fn try_get(&self, name: &str) -> Option<Arc<dyn TransportPort>> {
        self.inner.read_ports().get(name).cloned()
    }

    /// Unregisters and closes `name`.  Removing the active endpoint
    /// deactivates it first.  Returns whether the name was registered.
    pub fn remove(&self, name: &str) -> bool {
        let port = {
            let _activation = self.inner.lock_activation();
            if self.active_port_name().as_deref() == Some(name) {
                self.deactivate_locked();
            }
            self.inner.write_ports().remove(name)
        };
        let Some(port) = port else {
            return false;
        };
        if let Err(e) = port.close() {
            warn!(port = %name, "failed to close removed port: {e}");
        }
        info!(port = %name, "port removed");
        true
    }

    /// Registered names, sorted.
    pub fn port_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read_ports().keys().cloned().collect();
        names.sort();
        names
    }

    /// Makes `name` the active endpoint.
    ///
    /// Activating the already-active endpoint is a no-op.  Otherwise any
    /// partially assembled transmission is dropped, handlers move from the old
    /// endpoint to the new one, and one `ActivePortChanged` event is published.
    pub fn set_active(&self, name: &str) -> Result<(), RegistryError> {
        let _activation = self.inner.lock_activation();
        let port = self
            .try_get(name)
            .ok_or_else(|| RegistryError::UnknownPort(name.to_string()))?;

        let previous = {
            let mut session = self.inner.lock_session();
            if session.active.as_deref() == Some(name) {
                return Ok(());
            }
            let dropped = session.assembler.reset();
            if dropped > 0 {
                debug!(bytes = dropped, "dropped partial transmission on port switch");
            }
            session.active.replace(name.to_string())
        };

        if let Some(old) = previous.as_deref().and_then(|n| self.try_get(n)) {
            detach(old.as_ref());
        }
        attach(&self.inner, port.as_ref());

        info!(previous = ?previous, current = %name, "active port changed");
        self.inner.publish(RegistryEvent::ActivePortChanged {
            previous,
            current: Some(name.to_string()),
        });
        Ok(())
    }

    pub fn active_port_name(&self) -> Option<String> {
        self.inner.lock_session().active.clone()
    }

    pub fn active_port(&self) -> Option<Arc<dyn TransportPort>> {
        self.active_port_name().and_then(|name| self.try_get(&name))
    }

    /// Status of the active endpoint, or `Offline` when none is active.
    pub fn active_status(&self) -> PortStatus {
        self.active_port()
            .map(|port| port.status())
            .unwrap_or(PortStatus::Offline)
    }

    pub fn open_active(&self) -> Result<(), RegistryError> {
        let port = self.active_port().ok_or(RegistryError::NoActivePort)?;
        port.open()?;
        Ok(())
    }

    /// Closes the active endpoint and leaves the registry with none active.
    pub fn close_active(&self) -> Result<(), RegistryError> {
        let port = {
            let _activation = self.inner.lock_activation();
            let port = self.active_port().ok_or(RegistryError::NoActivePort)?;
            self.deactivate_locked();
            port
        };
        port.close()?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.inner.events.subscribe()
    }

    /// Clears the active endpoint.  Callers hold the activation lock.
    fn deactivate_locked(&self) {
        let previous = {
            let mut session = self.inner.lock_session();
            session.assembler.reset();
            session.active.take()
        };
        let Some(previous) = previous else { return };

        if let Some(port) = self.try_get(&previous) {
            detach(port.as_ref());
        }
        info!(previous = %previous, "active port cleared");
        self.inner.publish(RegistryEvent::ActivePortChanged {
            previous: Some(previous),
            current: None,
        });
    }
}

impl RegistryInner {
    fn read_ports(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn TransportPort>>> {
        self.ports.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_ports(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<dyn TransportPort>>> {
        self.ports.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_activation(&self) -> MutexGuard<'_, ()> {
        self.activation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: RegistryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Handles one chunk from `port_name`: frame, dispatch, acknowledge.
    fn on_chunk(&self, port_name: &str, chunk: &[u8]) {
        let outcome = {
            let mut session = self.lock_session();
            if session.active.as_deref() != Some(port_name) {
                debug!(port = %port_name, "ignoring bytes from inactive port");
                return;
            }
            session.assembler.push(chunk)
        };

        if let ChunkOutcome::MessageCompleted(text) = &outcome {
            let summary = self.dispatcher.process_message(text);
            debug!(?summary, "message dispatched");
        }

        if self.ack_policy.acknowledges(&outcome) {
            let port = self.read_ports().get(port_name).cloned();
            if let Some(port) = port {
                if let Err(e) = port.write(&[ACK]) {
                    warn!(port = %port_name, "failed to send ACK: {e}");
                }
            }
        }
    }

    fn on_status(&self, port_name: &str, status: PortStatus) {
        if self.lock_session().active.as_deref() != Some(port_name) {
            return;
        }
        debug!(port = %port_name, %status, "active port status changed");
        self.publish(RegistryEvent::StatusChanged {
            port: port_name.to_string(),
            status,
        });
    }
}

fn attach(inner: &Arc<RegistryInner>, port: &dyn TransportPort) {
    let name = port.name().to_string();

    let weak: Weak<RegistryInner> = Arc::downgrade(inner);
    let data_name = name.clone();
    port.set_data_handler(Some(Arc::new(move |chunk: &[u8]| {
        if let Some(inner) = weak.upgrade() {
            inner.on_chunk(&data_name, chunk);
        }
    })));

    let weak: Weak<RegistryInner> = Arc::downgrade(inner);
    port.set_status_handler(Some(Arc::new(move |status| {
        if let Some(inner) = weak.upgrade() {
            inner.on_status(&name, status);
        }
    })));
}

fn detach(port: &dyn TransportPort) {
    port.set_data_handler(None);
    port.set_status_handler(None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatch_records::{DispatcherConfig, MockResultSink};
    use crate::application::track_statistics::StatisticsTracker;
    use crate::infrastructure::transport::simulated::SimulatedTransport;
    use lis_core::protocol::{ENQ, EOT};

    fn registry_with(sink: MockResultSink, policy: AckPolicy) -> (PortRegistry, Arc<StatisticsTracker>) {
        let stats = Arc::new(StatisticsTracker::new());
        let dispatcher = Arc::new(RecordDispatcher::new(
            DispatcherConfig::default(),
            Arc::new(sink),
            Arc::clone(&stats),
        ));
        (PortRegistry::new(dispatcher, policy), stats)
    }

    fn registry() -> PortRegistry {
        registry_with(MockResultSink::new(), AckPolicy::EveryChunk).0
    }

    fn drain(rx: &mut broadcast::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn test_add_or_update_rejects_empty_name() {
        let registry = registry();
        let result = registry.add_or_update(Arc::new(SimulatedTransport::new("")));
        assert!(matches!(result, Err(RegistryError::EmptyPortName)));
    }

    #[test]
    fn test_port_names_are_sorted() {
        // Arrange
        let registry = registry();

        // Act
        for name in ["COM3", "COM1", "SIMCOM1"] {
            registry.add_or_update(Arc::new(SimulatedTransport::new(name))).unwrap();
        }

        // Assert
        assert_eq!(registry.port_names(), vec!["COM1", "COM3", "SIMCOM1"]);
        assert!(registry.try_get("COM3").is_some());
        assert!(registry.try_get("COM9").is_none());
    }

    #[test]
    fn test_set_active_unknown_port_fails() {
        // Arrange
        let registry = registry();

        // Act
        let result = registry.set_active("COM9");

        // Assert
        match result {
            Err(e @ RegistryError::UnknownPort(_)) => assert_eq!(e.to_string(), "Port COM9 not found"),
            other => panic!("expected UnknownPort, got {other:?}"),
        }
        assert_eq!(registry.active_port_name(), None);
    }

    #[test]
    fn test_active_status_is_offline_without_active_port() {
        assert_eq!(registry().active_status(), PortStatus::Offline);
    }

    #[test]
    fn test_switching_fires_one_event_and_clears_buffer() {
        // Arrange
        let (registry, stats) = registry_with(MockResultSink::new(), AckPolicy::Disabled);
        let a = Arc::new(SimulatedTransport::new("A"));
        let b = Arc::new(SimulatedTransport::new("B"));
        registry.add_or_update(a.clone()).unwrap();
        registry.add_or_update(b.clone()).unwrap();
        registry.set_active("A").unwrap();
        let mut events = registry.subscribe();
        a.inject(&[ENQ]);
        a.inject(b"L|1|N");

        // Act
        registry.set_active("B").unwrap();
        b.inject(&[EOT]);

        // Assert
        assert_eq!(
            drain(&mut events),
            vec![RegistryEvent::ActivePortChanged {
                previous: Some("A".to_string()),
                current: Some("B".to_string()),
            }]
        );
        assert_eq!(stats.records_read(), 0, "the partial message must not be dispatched");
    }

    #[test]
    fn test_set_active_same_port_is_noop() {
        // Arrange
        let registry = registry();
        registry.add_or_update(Arc::new(SimulatedTransport::new("A"))).unwrap();
        registry.set_active("A").unwrap();
        let mut events = registry.subscribe();

        // Act
        registry.set_active("A").unwrap();

        // Assert
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn test_inactive_port_bytes_are_ignored() {
        // Arrange
        let (registry, stats) = registry_with(MockResultSink::new(), AckPolicy::EveryChunk);
        let a = Arc::new(SimulatedTransport::new("A"));
        let b = Arc::new(SimulatedTransport::new("B"));
        registry.add_or_update(a.clone()).unwrap();
        registry.add_or_update(b.clone()).unwrap();
        registry.set_active("A").unwrap();
        registry.set_active("B").unwrap();
        a.open().unwrap();

        // Act
        a.inject(&[ENQ]);
        a.inject(b"L|1|N");
        a.inject(&[EOT]);

        // Assert
        assert_eq!(stats.records_read(), 0);
        assert!(a.take_written().is_empty(), "inactive port must not be ACKed");
        assert_eq!(a.queued_len(), 7, "detached port queues its bytes");
    }

    #[test]
    fn test_every_chunk_is_acknowledged_on_active_port() {
        // Arrange
        let (registry, stats) = registry_with(MockResultSink::new(), AckPolicy::EveryChunk);
        let port = Arc::new(SimulatedTransport::new("SIMCOM1"));
        registry.add_or_update(port.clone()).unwrap();
        registry.set_active("SIMCOM1").unwrap();
        registry.open_active().unwrap();

        // Act
        port.inject(&[ENQ]);
        port.inject(b"L|1|N\r");
        port.inject(&[EOT]);

        // Assert
        assert_eq!(port.take_written(), vec![ACK, ACK, ACK]);
        assert_eq!(stats.records_read(), 1);
        assert_eq!(stats.records_processed(), 1);
    }

    #[test]
    fn test_skip_end_of_transmission_policy_omits_final_ack() {
        // Arrange
        let (registry, _) = registry_with(MockResultSink::new(), AckPolicy::SkipEndOfTransmission);
        let port = Arc::new(SimulatedTransport::new("SIMCOM1"));
        registry.add_or_update(port.clone()).unwrap();
        registry.set_active("SIMCOM1").unwrap();
        registry.open_active().unwrap();

        // Act
        port.inject(&[ENQ]);
        port.inject(b"L|1|N\r");
        port.inject(&[EOT]);

        // Assert
        assert_eq!(port.take_written(), vec![ACK, ACK]);
    }

    #[test]
    fn test_active_status_changes_are_republished() {
        // Arrange
        let registry = registry();
        let port = Arc::new(SimulatedTransport::new("A"));
        registry.add_or_update(port.clone()).unwrap();
        registry.set_active("A").unwrap();
        let mut events = registry.subscribe();

        // Act
        registry.open_active().unwrap();

        // Assert
        assert_eq!(registry.active_status(), PortStatus::Connected);
        assert_eq!(
            drain(&mut events),
            vec![RegistryEvent::StatusChanged {
                port: "A".to_string(),
                status: PortStatus::Connected,
            }]
        );
    }

    #[test]
    fn test_open_active_without_active_port_fails() {
        assert!(matches!(registry().open_active(), Err(RegistryError::NoActivePort)));
    }

    #[test]
    fn test_open_active_twice_surfaces_transport_error() {
        let registry = registry();
        registry.add_or_update(Arc::new(SimulatedTransport::new("A"))).unwrap();
        registry.set_active("A").unwrap();
        registry.open_active().unwrap();

        let result = registry.open_active();

        assert!(matches!(
            result,
            Err(RegistryError::Transport(TransportError::AlreadyOpen(_)))
        ));
    }

    #[test]
    fn test_close_active_clears_active_and_publishes() {
        // Arrange
        let registry = registry();
        let port = Arc::new(SimulatedTransport::new("A"));
        registry.add_or_update(port.clone()).unwrap();
        registry.set_active("A").unwrap();
        registry.open_active().unwrap();
        let mut events = registry.subscribe();

        // Act
        registry.close_active().unwrap();

        // Assert
        assert_eq!(registry.active_port_name(), None);
        assert!(!port.is_open());
        assert_eq!(
            drain(&mut events),
            vec![RegistryEvent::ActivePortChanged {
                previous: Some("A".to_string()),
                current: None,
            }]
        );
    }

    #[test]
    fn test_remove_active_port_deactivates_and_closes() {
        // Arrange
        let registry = registry();
        let port = Arc::new(SimulatedTransport::new("A"));
        registry.add_or_update(port.clone()).unwrap();
        registry.set_active("A").unwrap();
        port.open().unwrap();

        // Act
        let removed = registry.remove("A");

        // Assert
        assert!(removed);
        assert!(!port.is_open());
        assert_eq!(registry.active_port_name(), None);
        assert!(registry.port_names().is_empty());
        assert!(!registry.remove("A"));
    }

    #[test]
    fn test_replacing_active_port_moves_handlers() {
        // Arrange
        let (registry, stats) = registry_with(MockResultSink::new(), AckPolicy::Disabled);
        let old = Arc::new(SimulatedTransport::new("A"));
        registry.add_or_update(old.clone()).unwrap();
        registry.set_active("A").unwrap();
        let new = Arc::new(SimulatedTransport::new("A"));

        // Act
        registry.add_or_update(new.clone()).unwrap();
        new.inject(&[ENQ]);
        new.inject(b"L|1|N");
        new.inject(&[EOT]);
        old.inject(b"stale");

        // Assert
        assert_eq!(stats.records_read(), 1);
        assert_eq!(old.queued_len(), 5);
    }

    #[test]
    fn test_concurrent_activation_leaves_active_port_attached() {
        use std::sync::Barrier;
        use std::thread;

        // Arrange
        let (registry, _) = registry_with(MockResultSink::new(), AckPolicy::Disabled);
        let a = Arc::new(SimulatedTransport::new("A"));
        let b = Arc::new(SimulatedTransport::new("B"));
        registry.add_or_update(a.clone()).unwrap();
        registry.add_or_update(b.clone()).unwrap();

        for _ in 0..500 {
            registry.set_active("A").unwrap();
            let barrier = Arc::new(Barrier::new(2));

            // Act: race a switch to B against a switch back to A
            let handles: Vec<_> = ["B", "A"]
                .into_iter()
                .map(|target| {
                    let registry = registry.clone();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        registry.set_active(target).unwrap();
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            // Assert: the winner is framing its bytes, the loser queues them
            let (active, inactive) = match registry.active_port_name().as_deref() {
                Some("A") => (&a, &b),
                Some("B") => (&b, &a),
                other => panic!("unexpected active port {other:?}"),
            };
            active.inject(b"x");
            inactive.inject(b"y");
            assert_eq!(active.queued_len(), 0, "active port lost its data handler");
            assert_eq!(inactive.queued_len(), 1, "inactive port kept a data handler");
            inactive.open().unwrap();
            inactive.read(16).unwrap();
            inactive.close().unwrap();
        }
    }
}
