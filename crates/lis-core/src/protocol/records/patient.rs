//! Patient record (`P`).

use std::fmt;
use std::str::FromStr;

use super::{components, single_char, Fields, RecordError, RecordKind, COMPONENT_SEPARATOR};

const REQUIRED_FIELDS: usize = 14;
const SPECIAL_FIELD_INDEX: usize = 15;

/// Free-form pair of user fields in position 15 (`UF1^UF2`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecialField {
    pub first: String,
    pub second: String,
}

impl FromStr for SpecialField {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = components("special field", s, 2)?;
        Ok(Self {
            first: parts[0].to_string(),
            second: parts[1].to_string(),
        })
    }
}

impl fmt::Display for SpecialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.first, COMPONENT_SEPARATOR, self.second)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRecord {
    pub record_id: String,
    pub sequence: u32,
    pub lab_patient_id: String,
    pub name: String,
    pub birthdate: String,
    pub sex: char,
    pub attending_physician: String,
    pub special: Option<SpecialField>,
}

impl FromStr for PatientRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = Fields::split(RecordKind::Patient, s, REQUIRED_FIELDS)?;
        let special = if fields.len() > SPECIAL_FIELD_INDEX {
            fields
                .non_empty(SPECIAL_FIELD_INDEX)
                .map(str::parse)
                .transpose()?
        } else {
            None
        };
        Ok(Self {
            record_id: fields.text(0).to_string(),
            sequence: fields.number(1, "patient sequence number")?,
            lab_patient_id: fields.text(3).to_string(),
            name: fields.text(5).to_string(),
            birthdate: fields.text(7).to_string(),
            sex: single_char("patient sex", fields.text(8))?,
            attending_physician: fields.text(13).to_string(),
            special,
        })
    }
}

impl fmt::Display for PatientRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}||{}||{}||{}|{}|||||{}||",
            self.record_id,
            self.sequence,
            self.lab_patient_id,
            self.name,
            self.birthdate,
            self.sex,
            self.attending_physician
        )?;
        match &self.special {
            Some(special) => write!(f, "{special}"),
            None => Ok(()),
        }
    }
}
