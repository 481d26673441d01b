//! The seven LIS2-A record kinds and the line-level codec.
//!
//! # Record anatomy (for beginners)
//!
//! Every line of a message is one record.  Fields are separated by `|`;
//! some fields are further split into components separated by `^`:
//!
//! ```text
//! R|1|^^^CBC^^^MCHC|33.21|||||F|||19960810082234||40009603A
//! │ │ └─universal test id─┘ │      │   └─started at─┘  └─instrument
//! │ └─sequence             value  status
//! └─record type
//! ```
//!
//! The first field names the record kind.  Some analyzers prefix it with a
//! frame-sequence digit (`1H|...`), so when the first field is longer than
//! one character the kind is whatever follows its first character.
//!
//! # Codec contract
//!
//! Each record type implements [`FromStr`](std::str::FromStr) and
//! [`Display`](std::fmt::Display).  For a well-formed line the two are exact
//! inverses: `line.parse::<ResultsRecord>()?.to_string() == line`.
//!
//! Positions the record does not model are dropped on parse and written back
//! as empty slots on format.

use std::fmt;

use thiserror::Error;

pub mod comment;
pub mod header;
pub mod patient;
pub mod request_information;
pub mod results;
pub mod terminator;
pub mod test_order;
pub mod universal_test_id;

pub use comment::{CommentRecord, CommentText};
pub use header::{HeaderRecord, SenderId};
pub use patient::{PatientRecord, SpecialField};
pub use request_information::{RangeId, RequestInformationRecord};
pub use results::ResultsRecord;
pub use terminator::{TerminationCode, TerminatorRecord};
pub use test_order::{SpecimenDescriptor, TestOrderRecord};
pub use universal_test_id::UniversalTestId;

/// Separates fields within a record line.
pub const FIELD_SEPARATOR: char = '|';
/// Separates components within a field.
pub const COMPONENT_SEPARATOR: char = '^';

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors raised while parsing a single record line.
///
/// An unrecognised record kind is *not* an error; [`parse_record`] returns
/// `Ok(None)` for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The line has fewer `|` fields than the record kind requires.
    #[error("{kind} record needs at least {required} fields, found {found}")]
    MissingField {
        kind: RecordKind,
        required: usize,
        found: usize,
    },

    /// A composite field has fewer `^` components than required.
    #[error("{field} needs at least {required} components, found {found}")]
    MissingComponent {
        field: &'static str,
        required: usize,
        found: usize,
    },

    /// A field that must be an integer is not one.
    #[error("{field} is not an integer: {value:?}")]
    InvalidInteger { field: &'static str, value: String },

    /// A field that must be exactly one character is not.
    #[error("{field} must be a single character: {value:?}")]
    InvalidCharacter { field: &'static str, value: String },
}

// ── Record kinds ──────────────────────────────────────────────────────────────

/// The closed set of record kinds understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Header,
    Patient,
    TestOrder,
    RequestInformation,
    Comment,
    Results,
    Terminator,
}

impl RecordKind {
    /// Maps a record-type string to its kind.
    ///
    /// Headers are accepted as either `H` or `1`.
    pub fn from_type_str(record_type: &str) -> Option<Self> {
        match record_type {
            "H" | "1" => Some(RecordKind::Header),
            "P" => Some(RecordKind::Patient),
            "O" => Some(RecordKind::TestOrder),
            "Q" => Some(RecordKind::RequestInformation),
            "C" => Some(RecordKind::Comment),
            "R" => Some(RecordKind::Results),
            "L" => Some(RecordKind::Terminator),
            _ => None,
        }
    }

    /// The canonical record-type letter.
    pub fn letter(self) -> char {
        match self {
            RecordKind::Header => 'H',
            RecordKind::Patient => 'P',
            RecordKind::TestOrder => 'O',
            RecordKind::RequestInformation => 'Q',
            RecordKind::Comment => 'C',
            RecordKind::Results => 'R',
            RecordKind::Terminator => 'L',
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Header => "Header",
            RecordKind::Patient => "Patient",
            RecordKind::TestOrder => "TestOrder",
            RecordKind::RequestInformation => "RequestInformation",
            RecordKind::Comment => "Comment",
            RecordKind::Results => "Results",
            RecordKind::Terminator => "Terminator",
        };
        f.write_str(name)
    }
}

// ── Record sum type ───────────────────────────────────────────────────────────

/// One decoded record line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Header(HeaderRecord),
    Patient(PatientRecord),
    TestOrder(TestOrderRecord),
    RequestInformation(RequestInformationRecord),
    Comment(CommentRecord),
    Results(ResultsRecord),
    Terminator(TerminatorRecord),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Header(_) => RecordKind::Header,
            Record::Patient(_) => RecordKind::Patient,
            Record::TestOrder(_) => RecordKind::TestOrder,
            Record::RequestInformation(_) => RecordKind::RequestInformation,
            Record::Comment(_) => RecordKind::Comment,
            Record::Results(_) => RecordKind::Results,
            Record::Terminator(_) => RecordKind::Terminator,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Header(r) => fmt::Display::fmt(r, f),
            Record::Patient(r) => fmt::Display::fmt(r, f),
            Record::TestOrder(r) => fmt::Display::fmt(r, f),
            Record::RequestInformation(r) => fmt::Display::fmt(r, f),
            Record::Comment(r) => fmt::Display::fmt(r, f),
            Record::Results(r) => fmt::Display::fmt(r, f),
            Record::Terminator(r) => fmt::Display::fmt(r, f),
        }
    }
}

// ── Line-level codec ──────────────────────────────────────────────────────────

/// Extracts the raw record-type string from a line.
///
/// Returns the first `|` field when it is a single character, otherwise the
/// remainder of that field after its first character.  An empty first field
/// yields `None`.
///
/// # Examples
///
/// ```rust
/// use lis_core::protocol::records::record_type;
///
/// assert_eq!(record_type("H|\\^&"), Some("H"));
/// assert_eq!(record_type("1H|\\^&"), Some("H"));
/// assert_eq!(record_type("|foo"), None);
/// ```
pub fn record_type(line: &str) -> Option<&str> {
    let first = line.split(FIELD_SEPARATOR).next().unwrap_or_default();
    let mut chars = first.char_indices();
    match (chars.next(), chars.next()) {
        (None, _) => None,
        (Some(_), None) => Some(first),
        (Some(_), Some((second, _))) => Some(&first[second..]),
    }
}

/// Determines the record kind of a line without parsing its fields.
pub fn classify(line: &str) -> Option<RecordKind> {
    record_type(line).and_then(RecordKind::from_type_str)
}

/// Parses one record line.
///
/// Returns `Ok(None)` when the line's record kind is not one of the seven
/// known kinds.
///
/// # Errors
///
/// Returns [`RecordError`] when the kind is known but the line is malformed.
pub fn parse_record(line: &str) -> Result<Option<Record>, RecordError> {
    let Some(kind) = classify(line) else {
        return Ok(None);
    };
    let record = match kind {
        RecordKind::Header => Record::Header(line.parse()?),
        RecordKind::Patient => Record::Patient(line.parse()?),
        RecordKind::TestOrder => Record::TestOrder(line.parse()?),
        RecordKind::RequestInformation => Record::RequestInformation(line.parse()?),
        RecordKind::Comment => Record::Comment(line.parse()?),
        RecordKind::Results => Record::Results(line.parse()?),
        RecordKind::Terminator => Record::Terminator(line.parse()?),
    };
    Ok(Some(record))
}

// ── Field helpers shared by the record parsers ───────────────────────────────

/// The `|` fields of one line, checked against a minimum count.
pub(crate) struct Fields<'a> {
    parts: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    pub(crate) fn split(
        kind: RecordKind,
        line: &'a str,
        required: usize,
    ) -> Result<Self, RecordError> {
        let parts: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if parts.len() < required {
            return Err(RecordError::MissingField {
                kind,
                required,
                found: parts.len(),
            });
        }
        Ok(Self { parts })
    }

    pub(crate) fn len(&self) -> usize {
        self.parts.len()
    }

    /// Field text, or `""` when the line is shorter than `index + 1`.
    pub(crate) fn text(&self, index: usize) -> &'a str {
        self.parts.get(index).copied().unwrap_or_default()
    }

    pub(crate) fn non_empty(&self, index: usize) -> Option<&'a str> {
        Some(self.text(index)).filter(|s| !s.is_empty())
    }

    pub(crate) fn number(&self, index: usize, field: &'static str) -> Result<u32, RecordError> {
        let value = self.text(index);
        value.parse().map_err(|_| RecordError::InvalidInteger {
            field,
            value: value.to_string(),
        })
    }
}

/// Splits a composite field on `^`, requiring at least `required` components.
pub(crate) fn components<'a>(
    field: &'static str,
    value: &'a str,
    required: usize,
) -> Result<Vec<&'a str>, RecordError> {
    let parts: Vec<&str> = value.split(COMPONENT_SEPARATOR).collect();
    if parts.len() < required {
        return Err(RecordError::MissingComponent {
            field,
            required,
            found: parts.len(),
        });
    }
    Ok(parts)
}

pub(crate) fn single_char(field: &'static str, value: &str) -> Result<char, RecordError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(RecordError::InvalidCharacter {
            field,
            value: value.to_string(),
        }),
    }
}
