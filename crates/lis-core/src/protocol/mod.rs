//! LIS2-A wire protocol: control bytes, record codec, and message conversion.

pub mod control;
pub mod message;
pub mod records;

pub use control::{sanitize_transmission, ACK, CR, ENQ, EOT, ETX, STX};
pub use message::convert_message;
pub use records::{Record, RecordError, RecordKind};
