//! Calendar timestamps carried by `Results` records.
//!
//! Analyzers report the moment a test was started as plain local time in one
//! of two textual layouts:
//!
//! | Layout       | Example               |
//! |--------------|-----------------------|
//! | compact      | `19960810082234`      |
//! | dashed       | `1996-08-10 08:22:34` |
//!
//! The layout is chosen by the presence of a `-` in the value.  No time zone
//! is carried on the wire, so [`ResultTimestamp`] is a naive date-time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while resolving a textual timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// The value does not have the shape of either accepted layout.
    #[error("timestamp {value:?} does not match the {layout} layout")]
    Layout { value: String, layout: &'static str },

    /// A component is numerically out of range (month 13, 31 April, ...).
    #[error("timestamp {value:?} has an out-of-range {component}")]
    OutOfRange {
        value: String,
        component: &'static str,
    },
}

/// A naive (zone-less) calendar date and time with one-second resolution.
///
/// Orders chronologically because the fields are declared from most to least
/// significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResultTimestamp {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

const COMPACT_LAYOUT: &str = "yyyyMMddHHmmss";
const DASHED_LAYOUT: &str = "yyyy-MM-dd HH:mm:ss";

impl ResultTimestamp {
    /// Builds a timestamp from its components, validating every range.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::OutOfRange`] naming the first invalid component.
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, TimestampError> {
        let out_of_range = |component| TimestampError::OutOfRange {
            value: format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"),
            component,
        };
        if year == 0 {
            return Err(out_of_range("year"));
        }
        if !(1..=12).contains(&month) {
            return Err(out_of_range("month"));
        }
        if day == 0 || day > days_in_month(year, month) {
            return Err(out_of_range("day"));
        }
        if hour > 23 {
            return Err(out_of_range("hour"));
        }
        if minute > 59 {
            return Err(out_of_range("minute"));
        }
        if second > 59 {
            return Err(out_of_range("second"));
        }
        Ok(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// Parses either accepted layout, picking the dashed one when the value
    /// contains a `-`.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] when the value matches neither layout or a
    /// component is out of range.
    pub fn parse(value: &str) -> Result<Self, TimestampError> {
        if value.contains('-') {
            Self::parse_dashed(value)
        } else {
            Self::parse_compact(value)
        }
    }

    /// Parses `yyyyMMddHHmmss`.
    pub fn parse_compact(value: &str) -> Result<Self, TimestampError> {
        let layout_error = || TimestampError::Layout {
            value: value.to_string(),
            layout: COMPACT_LAYOUT,
        };
        if value.len() != COMPACT_LAYOUT.len() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(layout_error());
        }
        let digits = value.as_bytes();
        Self::from_digit_groups(
            value,
            [
                &digits[0..4],
                &digits[4..6],
                &digits[6..8],
                &digits[8..10],
                &digits[10..12],
                &digits[12..14],
            ],
        )
    }

    /// Parses `yyyy-MM-dd HH:mm:ss`.
    pub fn parse_dashed(value: &str) -> Result<Self, TimestampError> {
        let layout_error = || TimestampError::Layout {
            value: value.to_string(),
            layout: DASHED_LAYOUT,
        };
        let bytes = value.as_bytes();
        if bytes.len() != DASHED_LAYOUT.len() {
            return Err(layout_error());
        }
        // Separators must sit exactly where the layout puts them; every other
        // position must be a digit.
        for (actual, expected) in bytes.iter().zip(DASHED_LAYOUT.bytes()) {
            let ok = match expected {
                b'-' | b' ' | b':' => *actual == expected,
                _ => actual.is_ascii_digit(),
            };
            if !ok {
                return Err(layout_error());
            }
        }
        Self::from_digit_groups(
            value,
            [
                &bytes[0..4],
                &bytes[5..7],
                &bytes[8..10],
                &bytes[11..13],
                &bytes[14..16],
                &bytes[17..19],
            ],
        )
    }

    fn from_digit_groups(value: &str, groups: [&[u8]; 6]) -> Result<Self, TimestampError> {
        let [year, month, day, hour, minute, second] = groups.map(digits_to_u16);
        Self::new(
            year,
            month as u8,
            day as u8,
            hour as u8,
            minute as u8,
            second as u8,
        )
        .map_err(|e| match e {
            TimestampError::OutOfRange { component, .. } => TimestampError::OutOfRange {
                value: value.to_string(),
                component,
            },
            other => other,
        })
    }

    /// Formats in the compact wire layout, `yyyyMMddHHmmss`.
    pub fn to_compact(&self) -> String {
        format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }

    pub fn year(&self) -> u16 {
        self.year
    }
    pub fn month(&self) -> u8 {
        self.month
    }
    pub fn day(&self) -> u8 {
        self.day
    }
    pub fn hour(&self) -> u8 {
        self.hour
    }
    pub fn minute(&self) -> u8 {
        self.minute
    }
    pub fn second(&self) -> u8 {
        self.second
    }
}

/// Caller guarantees every byte is an ASCII digit and the group has at most
/// four digits.
fn digits_to_u16(digits: &[u8]) -> u16 {
    digits
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'))
}

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

impl fmt::Display for ResultTimestamp {
    /// Formats in the dashed layout, `yyyy-MM-dd HH:mm:ss`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl FromStr for ResultTimestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<ResultTimestamp> for String {
    fn from(ts: ResultTimestamp) -> Self {
        ts.to_string()
    }
}

impl TryFrom<String> for ResultTimestamp {
    type Error = TimestampError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compact_layout() {
        // Arrange / Act
        let ts = ResultTimestamp::parse("19960810082234").expect("valid compact timestamp");

        // Assert
        assert_eq!(ts.year(), 1996);
        assert_eq!(ts.month(), 8);
        assert_eq!(ts.day(), 10);
        assert_eq!(ts.hour(), 8);
        assert_eq!(ts.minute(), 22);
        assert_eq!(ts.second(), 34);
    }

    #[test]
    fn test_parse_dashed_layout_when_value_contains_dash() {
        // Arrange / Act
        let ts = ResultTimestamp::parse("2023-10-05 08:17:47").expect("valid dashed timestamp");

        // Assert
        assert_eq!(ts, ResultTimestamp::new(2023, 10, 5, 8, 17, 47).unwrap());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = ResultTimestamp::parse("1996081008223").unwrap_err();
        assert!(matches!(err, TimestampError::Layout { .. }));
    }

    #[test]
    fn test_parse_rejects_non_digits() {
        let err = ResultTimestamp::parse("1996081008223X").unwrap_err();
        assert!(matches!(err, TimestampError::Layout { .. }));
    }

    #[test]
    fn test_parse_dashed_rejects_misplaced_separator() {
        let err = ResultTimestamp::parse("1996-0810 08:22:34").unwrap_err();
        assert!(matches!(err, TimestampError::Layout { .. }));
    }

    #[test]
    fn test_parse_rejects_out_of_range_month() {
        let err = ResultTimestamp::parse("19961310082234").unwrap_err();
        assert!(matches!(
            err,
            TimestampError::OutOfRange { component: "month", .. }
        ));
    }

    #[test]
    fn test_leap_day_only_valid_in_leap_years() {
        assert!(ResultTimestamp::parse("20000229000000").is_ok());
        assert!(ResultTimestamp::parse("19000229000000").is_err());
        assert!(ResultTimestamp::parse("20230229000000").is_err());
    }

    #[test]
    fn test_empty_value_is_a_layout_error() {
        assert!(matches!(
            ResultTimestamp::parse(""),
            Err(TimestampError::Layout { .. })
        ));
    }

    #[test]
    fn test_compact_and_display_formats() {
        // Arrange
        let ts = ResultTimestamp::new(1996, 8, 10, 15, 30, 28).unwrap();

        // Act / Assert
        assert_eq!(ts.to_compact(), "19960810153028");
        assert_eq!(ts.to_string(), "1996-08-10 15:30:28");
    }

    #[test]
    fn test_timestamps_order_chronologically() {
        let earlier = ResultTimestamp::parse("19960810082234").unwrap();
        let later = ResultTimestamp::parse("19960810153028").unwrap();
        assert!(earlier < later);
    }
}
