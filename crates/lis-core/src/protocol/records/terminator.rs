//! Terminator record (`L`): closes a message and says how to treat it.

use std::fmt;
use std::str::FromStr;

use super::{Fields, RecordError, RecordKind};

const REQUIRED_FIELDS: usize = 3;

/// Termination code in field 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationCode {
    /// `N`: process the message normally.
    Normal,
    /// `T`: the sender aborted the transmission.
    SenderAborted,
    /// `E`: the sender hit an unknown system error.
    SystemError,
    /// Any other code, kept verbatim.
    Other(String),
}

impl TerminationCode {
    pub fn as_str(&self) -> &str {
        match self {
            TerminationCode::Normal => "N",
            TerminationCode::SenderAborted => "T",
            TerminationCode::SystemError => "E",
            TerminationCode::Other(code) => code,
        }
    }

    /// `true` for every code except `N`.
    pub fn requests_discard(&self) -> bool {
        !matches!(self, TerminationCode::Normal)
    }
}

impl From<&str> for TerminationCode {
    fn from(code: &str) -> Self {
        match code {
            "N" => TerminationCode::Normal,
            "T" => TerminationCode::SenderAborted,
            "E" => TerminationCode::SystemError,
            other => TerminationCode::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminatorRecord {
    pub record_id: String,
    pub sequence: String,
    pub code: TerminationCode,
}

impl FromStr for TerminatorRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = Fields::split(RecordKind::Terminator, s, REQUIRED_FIELDS)?;
        Ok(Self {
            record_id: fields.text(0).to_string(),
            sequence: fields.text(1).to_string(),
            code: TerminationCode::from(fields.text(2)),
        })
    }
}

impl fmt::Display for TerminatorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.record_id, self.sequence, self.code.as_str())
    }
}
