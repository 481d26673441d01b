//! Test order record (`O`): names the specimen the following results belong to.

use std::fmt;
use std::str::FromStr;

use super::{components, Fields, RecordError, RecordKind, UniversalTestId, COMPONENT_SEPARATOR};

const REQUIRED_FIELDS: usize = 16;

/// Specimen type and subtype from field 15 (`Patient^Human`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecimenDescriptor {
    pub specimen_type: String,
    pub subtype: String,
}

impl FromStr for SpecimenDescriptor {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = components("specimen descriptor", s, 2)?;
        Ok(Self {
            specimen_type: parts[0].to_string(),
            subtype: parts[1].to_string(),
        })
    }
}

impl fmt::Display for SpecimenDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.specimen_type, COMPONENT_SEPARATOR, self.subtype)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOrderRecord {
    pub record_id: String,
    pub sequence: u32,
    /// Correlation key for every `Results` record that follows.
    pub specimen_id: String,
    pub test_id: Option<UniversalTestId>,
    pub collected_at: String,
    pub specimen: Option<SpecimenDescriptor>,
}

impl FromStr for TestOrderRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = Fields::split(RecordKind::TestOrder, s, REQUIRED_FIELDS)?;
        Ok(Self {
            record_id: fields.text(0).to_string(),
            sequence: fields.number(1, "order sequence number")?,
            specimen_id: fields.text(2).to_string(),
            test_id: fields.non_empty(4).map(str::parse).transpose()?,
            collected_at: fields.text(7).to_string(),
            specimen: fields.non_empty(15).map(str::parse).transpose()?,
        })
    }
}

impl fmt::Display for TestOrderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let test_id = self
            .test_id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let specimen = self
            .specimen
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        write!(
            f,
            "{}|{}|{}||{}|||{}||||||||{}",
            self.record_id, self.sequence, self.specimen_id, test_id, self.collected_at, specimen
        )
    }
}
