//! Domain value types for the LIS gateway.
//!
//! Nothing in here knows about bytes on a wire or files on disk.  The types
//! describe *what* the gateway talks about: a serial endpoint and its link
//! settings, the moment a test was started, and a single result bound for
//! the results store.

/// Endpoint status and serial link settings.
pub mod endpoint;
/// The unit of work handed to a result sink.
pub mod result;
/// Calendar timestamps carried by `Results` records.
pub mod timestamp;
