//! RecordDispatcher: folds the records of one message into specimen results
//! and hands them to a [`ResultSink`].
//!
//! # Specimen correlation (for beginners)
//!
//! An analyzer run arrives as one message:
//!
//! ```text
//! H|...                    header
//! P|...                    patient
//! O|1|19345|...            test order   ──► current specimen = 19345
//! R|1|^^^CBC^^^WBC|11.71   result       ──► written for 19345
//! R|2|^^^CBC^^^RBC|4.63    result       ──► written for 19345
//! L|1|N                    terminator
//! ```
//!
//! Results do not name their specimen.  They belong to whichever `TestOrder`
//! came last in the same message.  The "current specimen" starts empty for
//! every message and is only ever replaced by a later `TestOrder`.  A result
//! seen before any order cannot be correlated and is dropped with a warning.
//!
//! # Error policy
//!
//! Nothing in here aborts a message.  A record that cannot be written is
//! logged (and counted as a database error when the sink refused it), and
//! the fold moves on to the next record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use lis_core::protocol::convert_message;
use lis_core::protocol::records::{Record, ResultsRecord, TerminationCode};
use lis_core::{ResultTimestamp, SpecimenResult, RESULTED_STATUS};

use super::track_statistics::StatisticsTracker;

/// Error returned by a [`ResultSink`] that could not persist a result.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The underlying store could not be reached or written.
    #[error("I/O error writing result: {0}")]
    Io(#[from] std::io::Error),

    /// The result could not be encoded for the store.
    #[error("failed to encode result: {0}")]
    Encode(String),

    /// The store refused the result.
    #[error("result rejected by store: {0}")]
    Rejected(String),
}

/// Persistence capability consumed by the dispatcher.
///
/// Implementations block until the result is stored or has failed; they are
/// called from the endpoint's reader thread.
#[cfg_attr(test, mockall::automock)]
pub trait ResultSink: Send + Sync {
    fn write(&self, result: &SpecimenResult) -> Result<(), SinkError>;
}

/// What the dispatcher does with a message whose terminator carries a code
/// other than `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminatorPolicy {
    /// Process the message as usual.
    #[default]
    Ignore,
    /// Dispatch none of the message's records.
    DiscardOnAbort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Written to every result as the receiving client's name.
    pub client_name: String,
    pub terminator_policy: TerminatorPolicy,
}

pub const DEFAULT_CLIENT_NAME: &str = "Ruby_01";

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            terminator_policy: TerminatorPolicy::default(),
        }
    }
}

/// Per-record failures.  Logged, never propagated out of a message.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("result {sequence} has no result label to use as assay code")]
    MissingResultLabel { sequence: u32 },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Outcome of dispatching one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchSummary {
    /// Records in the message.
    pub records: usize,
    /// Results accepted by the sink.
    pub written: usize,
    /// Results the sink failed to store.
    pub failed: usize,
    /// Results dropped because no test order preceded them.
    pub skipped: usize,
    /// Results that could not be turned into a `SpecimenResult`.
    pub rejected: usize,
    /// `true` when the terminator policy discarded the whole message.
    pub discarded: bool,
}

pub struct RecordDispatcher {
    config: DispatcherConfig,
    sink: Arc<dyn ResultSink>,
    statistics: Arc<StatisticsTracker>,
}

impl RecordDispatcher {
    pub fn new(
        config: DispatcherConfig,
        sink: Arc<dyn ResultSink>,
        statistics: Arc<StatisticsTracker>,
    ) -> Self {
        Self {
            config,
            sink,
            statistics,
        }
    }

    /// Decodes a completed message and dispatches its records.
    ///
    /// The records-read counter grows by the number of records decoded,
    /// regardless of how each one is handled afterwards.
    pub fn process_message(&self, text: &str) -> DispatchSummary {
        let records = convert_message(text);
        self.statistics.increment_records_read(records.len() as u64);
        let summary = self.dispatch(&records);
        info!(
            records = summary.records,
            written = summary.written,
            failed = summary.failed,
            skipped = summary.skipped,
            "message processed"
        );
        summary
    }

    /// Folds `records` left to right, correlating results with the most
    /// recent test order.
    pub fn dispatch(&self, records: &[Record]) -> DispatchSummary {
        let mut summary = DispatchSummary {
            records: records.len(),
            ..DispatchSummary::default()
        };

        if self.config.terminator_policy == TerminatorPolicy::DiscardOnAbort {
            if let Some(code) = abort_code(records) {
                warn!(
                    code = code.as_str(),
                    records = records.len(),
                    "terminator requested discard, message dropped"
                );
                summary.discarded = true;
                return summary;
            }
        }

        let mut current_specimen_id = "";
        for record in records {
            match record {
                Record::TestOrder(order) => {
                    current_specimen_id = order.specimen_id.as_str();
                    self.statistics.increment_test_orders_received();
                    debug!(specimen = current_specimen_id, "test order received");
                }
                Record::Results(result) => {
                    self.statistics.increment_results_received();
                    if current_specimen_id.is_empty() {
                        warn!(
                            sequence = result.sequence,
                            "result received without a preceding test order, skipped"
                        );
                        summary.skipped += 1;
                        continue;
                    }
                    match self.write_result(current_specimen_id, result) {
                        Ok(()) => {
                            self.statistics.increment_records_written();
                            summary.written += 1;
                        }
                        Err(DispatchError::Sink(e)) => {
                            self.statistics.increment_database_errors();
                            error!(specimen = current_specimen_id, "failed to store result: {e}");
                            summary.failed += 1;
                        }
                        Err(e) => {
                            error!(specimen = current_specimen_id, "{e}");
                            summary.rejected += 1;
                        }
                    }
                }
                _ => {}
            }
            self.statistics.increment_records_processed();
        }
        summary
    }

    fn write_result(&self, specimen_id: &str, result: &ResultsRecord) -> Result<(), DispatchError> {
        let assay_code = result
            .result_label()
            .ok_or(DispatchError::MissingResultLabel {
                sequence: result.sequence,
            })?;
        let timestamp = match ResultTimestamp::parse(&result.started_at) {
            Ok(ts) => Some(ts),
            Err(e) => {
                error!(specimen = specimen_id, assay = assay_code, "unusable test start time: {e}");
                None
            }
        };
        let specimen_result = SpecimenResult {
            specimen_id: specimen_id.to_string(),
            assay_code: assay_code.to_string(),
            value: result.value.clone(),
            status: RESULTED_STATUS.to_string(),
            timestamp,
            client_name: self.config.client_name.clone(),
        };
        self.sink.write(&specimen_result)?;
        Ok(())
    }
}

/// The first non-`N` termination code in the message, if any.
fn abort_code(records: &[Record]) -> Option<&TerminationCode> {
    records.iter().find_map(|record| match record {
        Record::Terminator(t) if t.code.requests_discard() => Some(&t.code),
        _ => None,
    })
}
