//! The unit of work handed to a result sink.

use serde::{Deserialize, Serialize};

use super::timestamp::ResultTimestamp;

/// Status attached to every result the dispatcher persists.
pub const RESULTED_STATUS: &str = "RESULTED";

/// One analyzer result correlated with the specimen it belongs to.
///
/// Built by the dispatcher from a `Results` record and the specimen id of
/// the most recent `TestOrder` in the same message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecimenResult {
    /// Specimen (lab number) the result belongs to.
    pub specimen_id: String,
    /// Assay code, taken from the result label of the universal test id.
    pub assay_code: String,
    /// Measured value exactly as transmitted (`"33.21"`, `">>>>>"`, `"-----"`).
    pub value: String,
    /// Always [`RESULTED_STATUS`] for results produced by the gateway.
    pub status: String,
    /// When the test was started; `None` if the analyzer sent an unparseable value.
    pub timestamp: Option<ResultTimestamp>,
    /// Name of the gateway instance that received the result.
    pub client_name: String,
}
