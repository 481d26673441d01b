//! Request information record (`Q`): a host query for orders.

use std::fmt;
use std::str::FromStr;

use super::{components, Fields, RecordError, RecordKind, COMPONENT_SEPARATOR};

const REQUIRED_FIELDS: usize = 3;

/// Starting range id (`^ALL`, `^M34566`).  The first component is
/// conventionally empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangeId {
    pub first: String,
    pub second: String,
}

impl FromStr for RangeId {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = components("starting range id", s, 2)?;
        Ok(Self {
            first: parts[0].to_string(),
            second: parts[1].to_string(),
        })
    }
}

impl fmt::Display for RangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.first, COMPONENT_SEPARATOR, self.second)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInformationRecord {
    pub record_id: String,
    /// Kept as text; queries are echoed, never computed on.
    pub sequence: String,
    pub range: RangeId,
}

impl FromStr for RequestInformationRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = Fields::split(RecordKind::RequestInformation, s, REQUIRED_FIELDS)?;
        Ok(Self {
            record_id: fields.text(0).to_string(),
            sequence: fields.text(1).to_string(),
            range: fields.text(2).parse()?,
        })
    }
}

impl fmt::Display for RequestInformationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.record_id, self.sequence, self.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_for_all_orders() {
        // Arrange / Act
        let query: RequestInformationRecord = "Q|1|^ALL".parse().expect("valid query");

        // Assert
        assert_eq!(query.sequence, "1");
        assert_eq!(query.range.first, "");
        assert_eq!(query.range.second, "ALL");
        assert_eq!(query.to_string(), "Q|1|^ALL");
    }

    #[test]
    fn test_parse_query_for_single_specimen() {
        let query: RequestInformationRecord = "Q|1|^M34566".parse().expect("valid query");
        assert_eq!(query.range.second, "M34566");
        assert_eq!(query.to_string(), "Q|1|^M34566");
    }

    #[test]
    fn test_query_without_component_separator_fails() {
        let err = "Q|1|ALL".parse::<RequestInformationRecord>().unwrap_err();
        assert!(matches!(err, RecordError::MissingComponent { found: 1, .. }));
    }
}
