//! Infrastructure layer for the gateway.
//!
//! Contains OS-facing adapters: serial and simulated transports, port
//! discovery, configuration files and the result sink.
//!
//! **Dependency rule**: this layer may depend on `application` and `lis_core`.
//! The application layer only reaches in for the `TransportPort` seam.

pub mod discovery;
pub mod storage;
pub mod transport;
