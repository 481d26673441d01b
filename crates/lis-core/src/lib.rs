//! # lis-core
//!
//! Shared library for the LIS gateway containing the LIS2-A record codec,
//! the transmission-control byte constants, and the domain value types that
//! flow between the framing, dispatching, and persistence layers.
//!
//! It has zero dependencies on OS APIs, serial drivers, or storage.
//!
//! # Architecture overview (for beginners)
//!
//! A hematology analyzer reports its results over a serial line using the
//! LIS2-A protocol.  A transmission is bracketed by two control bytes (ENQ to
//! start, EOT to end) and carries a block of text lines called *records*.
//! Each record is a `|`-separated list of fields; some fields are further
//! split into `^`-separated components.
//!
//! This crate (`lis-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – The wire format.  Control bytes, the seven record kinds
//!   (`Header`, `Patient`, `TestOrder`, `RequestInformation`, `Comment`,
//!   `Results`, `Terminator`), and the conversion of a whole message into an
//!   ordered list of typed records.
//!
//! - **`domain`** – Plain value types with no protocol knowledge: endpoint
//!   status and link settings, result timestamps, and the `SpecimenResult`
//!   handed to persistence.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `lis_core::Record` instead of `lis_core::protocol::records::Record`.
pub use domain::endpoint::{DataBits, LinkConfig, Parity, PortStatus, StopBits};
pub use domain::result::{SpecimenResult, RESULTED_STATUS};
pub use domain::timestamp::{ResultTimestamp, TimestampError};
pub use protocol::message::convert_message;
pub use protocol::records::{classify, parse_record, record_type, Record, RecordError, RecordKind};
