//! JSON-lines result sink.
//!
//! Each stored result becomes one line of JSON in an append-only file:
//!
//! ```text
//! {"specimen_id":"19345","assay_code":"MCHC","value":"33.21","status":"RESULTED","timestamp":"2021-10-07 15:49:12","client_name":"Ruby_01"}
//! ```
//!
//! The file is opened once, in append mode, and shared behind a mutex so the
//! reader threads of different ports never interleave partial lines.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use lis_core::SpecimenResult;

use crate::application::dispatch_records::{ResultSink, SinkError};

pub struct JsonLinesResultSink {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
}

impl JsonLinesResultSink {
    /// Opens (or creates) `path` for appending, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "result sink opened");
        Ok(Self {
            path,
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonLinesResultSink {
    fn write(&self, result: &SpecimenResult) -> Result<(), SinkError> {
        let line = serde_json::to_string(result).map_err(|e| SinkError::Encode(e.to_string()))?;
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        debug!(specimen = %result.specimen_id, assay = %result.assay_code, "result stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lis_core::{ResultTimestamp, RESULTED_STATUS};
    use uuid::Uuid;

    fn sample(assay: &str, value: &str) -> SpecimenResult {
        SpecimenResult {
            specimen_id: "19345".to_string(),
            assay_code: assay.to_string(),
            value: value.to_string(),
            status: RESULTED_STATUS.to_string(),
            timestamp: Some(ResultTimestamp::parse("20211007154912").unwrap()),
            client_name: "Ruby_01".to_string(),
        }
    }

    #[test]
    fn test_results_are_appended_one_per_line() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("lis_sink_test_{}", Uuid::new_v4()));
        let path = dir.join("out").join("results.jsonl");
        let sink = JsonLinesResultSink::open(&path).expect("open creates directories");

        // Act
        sink.write(&sample("MCHC", "33.21")).unwrap();
        sink.write(&sample("PLT", ">>>>>")).unwrap();

        // Assert
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: SpecimenResult = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, sample("MCHC", "33.21"));
        assert!(lines[0].contains("\"timestamp\":\"2021-10-07 15:49:12\""));
        let second: SpecimenResult = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.value, ">>>>>");

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_reopening_appends_instead_of_truncating() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("lis_sink_test_{}", Uuid::new_v4()));
        let path = dir.join("results.jsonl");
        JsonLinesResultSink::open(&path).unwrap().write(&sample("MCV", "88.1")).unwrap();

        // Act
        JsonLinesResultSink::open(&path).unwrap().write(&sample("MCH", "29.3")).unwrap();

        // Assert
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_timestamp_is_written_as_null() {
        let dir = std::env::temp_dir().join(format!("lis_sink_test_{}", Uuid::new_v4()));
        let sink = JsonLinesResultSink::open(dir.join("results.jsonl")).unwrap();
        let mut result = sample("RBC", "4.52");
        result.timestamp = None;

        sink.write(&result).unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert!(content.contains("\"timestamp\":null"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
