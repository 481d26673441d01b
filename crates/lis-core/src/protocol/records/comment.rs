//! Comment record (`C`).

use std::fmt;
use std::str::FromStr;

use super::{components, Fields, RecordError, RecordKind, COMPONENT_SEPARATOR};

const REQUIRED_FIELDS: usize = 5;

/// Comment text split into a main and a secondary reason.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentText {
    pub main: String,
    pub secondary: String,
}

impl FromStr for CommentText {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = components("comment text", s, 2)?;
        Ok(Self {
            main: parts[0].to_string(),
            secondary: parts[1].to_string(),
        })
    }
}

impl fmt::Display for CommentText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.main, COMPONENT_SEPARATOR, self.secondary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub record_id: String,
    pub sequence: u32,
    /// `I` when the comment originates from the instrument.
    pub source: String,
    pub text: CommentText,
    pub comment_type: String,
}

impl FromStr for CommentRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = Fields::split(RecordKind::Comment, s, REQUIRED_FIELDS)?;
        Ok(Self {
            record_id: fields.text(0).to_string(),
            sequence: fields.number(1, "comment sequence number")?,
            source: fields.text(2).to_string(),
            text: fields.text(3).parse()?,
            comment_type: fields.text(4).to_string(),
        })
    }
}

impl fmt::Display for CommentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.record_id, self.sequence, self.source, self.text, self.comment_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "C|1|I|Order List Add Failed^RecordID|G";

    #[test]
    fn test_parse_comment_fields() {
        // Arrange / Act
        let comment: CommentRecord = LINE.parse().expect("valid comment");

        // Assert
        assert_eq!(comment.sequence, 1);
        assert_eq!(comment.source, "I");
        assert_eq!(comment.text.main, "Order List Add Failed");
        assert_eq!(comment.text.secondary, "RecordID");
        assert_eq!(comment.comment_type, "G");
    }

    #[test]
    fn test_comment_round_trips() {
        let comment: CommentRecord = LINE.parse().expect("valid comment");
        assert_eq!(comment.to_string(), LINE);
    }

    #[test]
    fn test_comment_with_missing_type_field_fails() {
        let err = "C|1|I|Order List Add Failed^RecordID"
            .parse::<CommentRecord>()
            .unwrap_err();
        assert!(matches!(
            err,
            RecordError::MissingField { kind: RecordKind::Comment, required: 5, found: 4 }
        ));
    }
}
