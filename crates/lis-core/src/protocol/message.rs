//! Conversion of a completed, sanitised message into ordered records.

use tracing::{debug, error};

use super::records::{parse_record, Record};

/// Splits `text` into lines and parses each one.
///
/// Blank lines are skipped.  A line whose kind is unknown is skipped with a
/// debug log; a malformed line of a known kind is logged as an error and
/// skipped.  Neither stops the remaining lines from being parsed, and the
/// returned records keep the order of their lines.
pub fn convert_message(text: &str) -> Vec<Record> {
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_record(line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {
                debug!(line_number = index + 1, "skipping unrecognised record type: {line:?}")
            }
            Err(e) => error!(line_number = index + 1, "failed to parse record {line:?}: {e}"),
        }
    }
    records
}
