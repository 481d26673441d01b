//! Header record (`H`): identifies the sending instrument and protocol version.
//!
//! ```text
//! H|\^&|||40009603A^CDRuby^R5-4H^1.0|||||||P|LIS2-A
//!   └┬┘   └──────────sender─────────┘        │ └version
//!  delimiters                           processing id
//! ```

use std::fmt;
use std::str::FromStr;

use super::{components, Fields, RecordError, RecordKind, COMPONENT_SEPARATOR};

const REQUIRED_FIELDS: usize = 13;

/// Instrument identity carried in field 4 of the header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SenderId {
    pub serial_number: String,
    pub model: String,
    pub software_version: String,
    pub host_interface_version: String,
}

impl FromStr for SenderId {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = components("sender name", s, 4)?;
        Ok(Self {
            serial_number: parts[0].to_string(),
            model: parts[1].to_string(),
            software_version: parts[2].to_string(),
            host_interface_version: parts[3].to_string(),
        })
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = COMPONENT_SEPARATOR;
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.serial_number, self.model, self.software_version, self.host_interface_version
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    /// Record type exactly as received (`H`, or `1H` with a frame digit).
    pub record_id: String,
    /// Delimiter definition, normally `\^&`.
    pub delimiters: String,
    pub sender: Option<SenderId>,
    /// `P` for production, `D` for debugging.
    pub processing_id: String,
    pub version: String,
}

impl FromStr for HeaderRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = Fields::split(RecordKind::Header, s, REQUIRED_FIELDS)?;
        Ok(Self {
            record_id: fields.text(0).to_string(),
            delimiters: fields.text(1).to_string(),
            sender: fields.non_empty(4).map(str::parse).transpose()?,
            processing_id: fields.text(11).to_string(),
            version: fields.text(12).to_string(),
        })
    }
}

impl fmt::Display for HeaderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sender = self
            .sender
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        write!(
            f,
            "{}|{}|||{}|||||||{}|{}",
            self.record_id, self.delimiters, sender, self.processing_id, self.version
        )
    }
}
