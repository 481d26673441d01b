//! Universal test identifier, the composite assay key shared by `TestOrder`
//! and `Results` records.
//!
//! ```text
//! ^^^CBC^5^0          order: selection CBC, parameter set 5, limit set 0
//! ^^^CBC^^^MCHC       result: selection CBC, result label MCHC
//! ```

use std::fmt;
use std::str::FromStr;

use super::{components, RecordError, COMPONENT_SEPARATOR};

const FIELD: &str = "universal test id";
const REQUIRED_COMPONENTS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UniversalTestId {
    pub code: String,
    pub name: String,
    pub test_type: String,
    pub selection: String,
    pub parameter_set: Option<u32>,
    pub limit_set: Option<u32>,
    /// The assay label carried by results (`WBC`, `MCHC`, ...).  Absent on orders.
    pub result_label: Option<String>,
}

impl FromStr for UniversalTestId {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = components(FIELD, s, REQUIRED_COMPONENTS)?;
        Ok(Self {
            code: parts[0].to_string(),
            name: parts[1].to_string(),
            test_type: parts[2].to_string(),
            selection: parts[3].to_string(),
            parameter_set: optional_number("parameter set selection", parts[4])?,
            limit_set: optional_number("limit set selection", parts[5])?,
            result_label: parts
                .get(6)
                .filter(|label| !label.is_empty())
                .map(|label| label.to_string()),
        })
    }
}

fn optional_number(field: &'static str, value: &str) -> Result<Option<u32>, RecordError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| RecordError::InvalidInteger {
            field,
            value: value.to_string(),
        })
}

impl fmt::Display for UniversalTestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = COMPONENT_SEPARATOR;
        let number = |n: Option<u32>| n.map(|n| n.to_string()).unwrap_or_default();
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.code,
            self.name,
            self.test_type,
            self.selection,
            number(self.parameter_set),
            number(self.limit_set),
        )?;
        match self.result_label.as_deref() {
            Some(label) if !label.is_empty() => write!(f, "{sep}{label}"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_style_id_with_selections() {
        // Arrange / Act
        let id: UniversalTestId = "^^^CBC^5^0".parse().expect("valid id");

        // Assert
        assert_eq!(id.selection, "CBC");
        assert_eq!(id.parameter_set, Some(5));
        assert_eq!(id.limit_set, Some(0));
        assert_eq!(id.result_label, None);
        assert_eq!(id.to_string(), "^^^CBC^5^0");
    }

    #[test]
    fn test_parse_result_style_id_with_label() {
        // Arrange / Act
        let id: UniversalTestId = "^^^CBC^^^RBC MORPH".parse().expect("valid id");

        // Assert
        assert_eq!(id.parameter_set, None);
        assert_eq!(id.limit_set, None);
        assert_eq!(id.result_label.as_deref(), Some("RBC MORPH"));
        assert_eq!(id.to_string(), "^^^CBC^^^RBC MORPH");
    }

    #[test]
    fn test_parse_rejects_too_few_components() {
        let err = "^^^CBC".parse::<UniversalTestId>().unwrap_err();
        assert_eq!(
            err,
            RecordError::MissingComponent {
                field: FIELD,
                required: 6,
                found: 4,
            }
        );
    }

    #[test]
    fn test_parse_rejects_non_numeric_selection() {
        let err = "^^^CBC^x^0".parse::<UniversalTestId>().unwrap_err();
        assert!(matches!(err, RecordError::InvalidInteger { .. }));
    }

    #[test]
    fn test_empty_label_is_not_written_back() {
        // Arrange
        let id = UniversalTestId {
            selection: "CBC".to_string(),
            result_label: Some(String::new()),
            ..UniversalTestId::default()
        };

        // Act / Assert
        assert_eq!(id.to_string(), "^^^CBC^^");
    }
}
