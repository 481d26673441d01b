//! Application layer use cases for the gateway.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (the LIS2-A record model in `lis-core`) and the infrastructure (serial
//! ports, files, timers).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a goal ("turn the analyzer's
//!   byte stream into stored results").
//! - **Depend on abstractions** (`TransportPort`, `ResultSink`) rather than
//!   concrete devices or files, so tests can drive them with in-memory doubles.
//! - **Perform no direct OS calls.**
//!
//! # Sub-modules
//!
//! - **`assemble_frames`**   – ENQ/EOT session framing of the raw byte stream.
//! - **`dispatch_records`**  – Decodes a completed message, correlates results
//!   with their test order and hands them to the result sink.
//! - **`manage_ports`**      – The endpoint registry and the single active
//!   endpoint whose bytes are processed.
//! - **`track_statistics`**  – Operational counters with change notification.

pub mod assemble_frames;
pub mod dispatch_records;
pub mod manage_ports;
pub mod track_statistics;
