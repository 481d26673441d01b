//! Results record (`R`): one measured value for the specimen of the
//! preceding `TestOrder`.

use std::fmt;
use std::str::FromStr;

use super::{single_char, Fields, RecordError, RecordKind, UniversalTestId};

const REQUIRED_FIELDS: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsRecord {
    pub record_id: String,
    pub sequence: u32,
    pub test_id: Option<UniversalTestId>,
    /// Value exactly as transmitted; may be a flag such as `>>>>>` or `FLAG`.
    pub value: String,
    /// Result status flag (`F` final, `W` warning, `X` not measurable, ...).
    pub status: Option<char>,
    pub operator_id: String,
    /// Date/time the test started; see `ResultTimestamp` for accepted layouts.
    pub started_at: String,
    pub instrument_id: String,
}

impl ResultsRecord {
    /// The assay code used for persistence, taken from the result label.
    pub fn result_label(&self) -> Option<&str> {
        self.test_id.as_ref()?.result_label.as_deref()
    }
}

impl FromStr for ResultsRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = Fields::split(RecordKind::Results, s, REQUIRED_FIELDS)?;
        Ok(Self {
            record_id: fields.text(0).to_string(),
            sequence: fields.number(1, "result sequence number")?,
            test_id: fields.non_empty(2).map(str::parse).transpose()?,
            value: fields.text(3).to_string(),
            status: fields
                .non_empty(8)
                .map(|v| single_char("result status", v))
                .transpose()?,
            operator_id: fields.text(9).to_string(),
            started_at: fields.text(11).to_string(),
            instrument_id: fields.text(13).to_string(),
        })
    }
}

impl fmt::Display for ResultsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let test_id = self
            .test_id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let status = self.status.map(String::from).unwrap_or_default();
        write!(
            f,
            "{}|{}|{}|{}|||||{}|{}||{}||{}",
            self.record_id,
            self.sequence,
            test_id,
            self.value,
            status,
            self.operator_id,
            self.started_at,
            self.instrument_id
        )
    }
}
