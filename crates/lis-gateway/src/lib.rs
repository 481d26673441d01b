//! LIS gateway library crate.
//!
//! Receives LIS2-A transmissions from a hematology analyzer over a serial
//! line, decodes them, correlates each result with its specimen and stores
//! the results.  The binary in `main.rs` wires these pieces together; the
//! library is exposed for integration tests.

pub mod application;
pub mod infrastructure;
