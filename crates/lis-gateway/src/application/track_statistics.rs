//! StatisticsTracker: lock-free operational counters with change notification.
//!
//! Six counters describe what the gateway has done since start-up:
//!
//! | Counter                | Incremented when                                   |
//! |------------------------|----------------------------------------------------|
//! | `RecordsRead`          | a message is decoded (by its record count)         |
//! | `RecordsProcessed`     | a record has been handled by the dispatcher        |
//! | `TestOrdersReceived`   | a `TestOrder` record is seen                       |
//! | `ResultsReceived`      | a `Results` record is seen                         |
//! | `RecordsWritten`       | the result sink accepted a result                  |
//! | `DatabaseErrors`       | the result sink rejected a result                  |
//!
//! # Thread safety
//!
//! Each counter is an `AtomicU64` updated with `fetch_add`, so increments
//! from the serial reader thread and from test threads never lose updates and
//! never block.  Observers learn about changes through a
//! `tokio::sync::broadcast` channel; every increment publishes exactly one
//! [`CounterChange`].  A slow observer may miss events (the channel is
//! bounded), but it can always call [`StatisticsTracker::snapshot`] to
//! resynchronise.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered change events per subscriber before the oldest are dropped.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Identifies one of the six counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    RecordsRead,
    RecordsProcessed,
    TestOrdersReceived,
    ResultsReceived,
    RecordsWritten,
    DatabaseErrors,
}

impl Counter {
    pub const ALL: [Counter; 6] = [
        Counter::RecordsRead,
        Counter::RecordsProcessed,
        Counter::TestOrdersReceived,
        Counter::ResultsReceived,
        Counter::RecordsWritten,
        Counter::DatabaseErrors,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Counter::RecordsRead => "records read",
            Counter::RecordsProcessed => "records processed",
            Counter::TestOrdersReceived => "test orders received",
            Counter::ResultsReceived => "results received",
            Counter::RecordsWritten => "records written",
            Counter::DatabaseErrors => "database errors",
        };
        f.write_str(name)
    }
}

/// Published after every increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterChange {
    pub counter: Counter,
    /// Value of the counter immediately after this increment.
    pub value: u64,
}

/// Point-in-time copy of all six counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatisticsSnapshot {
    pub records_read: u64,
    pub records_processed: u64,
    pub test_orders_received: u64,
    pub results_received: u64,
    pub records_written: u64,
    pub database_errors: u64,
}

/// Shared operational counters.
///
/// Usually held in an `Arc` and shared between the dispatcher (writer) and
/// any number of observers (readers).
pub struct StatisticsTracker {
    counters: [AtomicU64; 6],
    changes: broadcast::Sender<CounterChange>,
}

impl StatisticsTracker {
    /// Creates a tracker with every counter at zero.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            counters: Default::default(),
            changes,
        }
    }

    /// Adds `by` to `counter`, publishes the change, and returns the new value.
    ///
    /// `Ordering::Relaxed` is sufficient: the counters are statistics, not
    /// synchronisation points between threads.
    pub fn increment(&self, counter: Counter, by: u64) -> u64 {
        let value = self.counters[counter.index()].fetch_add(by, Ordering::Relaxed) + by;
        // `send` only fails when nobody is subscribed, which is not an error.
        let _ = self.changes.send(CounterChange { counter, value });
        value
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    pub fn increment_records_read(&self, by: u64) -> u64 {
        self.increment(Counter::RecordsRead, by)
    }

    pub fn increment_records_processed(&self) -> u64 {
        self.increment(Counter::RecordsProcessed, 1)
    }

    pub fn increment_test_orders_received(&self) -> u64 {
        self.increment(Counter::TestOrdersReceived, 1)
    }

    pub fn increment_results_received(&self) -> u64 {
        self.increment(Counter::ResultsReceived, 1)
    }

    pub fn increment_records_written(&self) -> u64 {
        self.increment(Counter::RecordsWritten, 1)
    }

    pub fn increment_database_errors(&self) -> u64 {
        self.increment(Counter::DatabaseErrors, 1)
    }

    pub fn records_read(&self) -> u64 {
        self.get(Counter::RecordsRead)
    }

    pub fn records_processed(&self) -> u64 {
        self.get(Counter::RecordsProcessed)
    }

    pub fn test_orders_received(&self) -> u64 {
        self.get(Counter::TestOrdersReceived)
    }

    pub fn results_received(&self) -> u64 {
        self.get(Counter::ResultsReceived)
    }

    pub fn records_written(&self) -> u64 {
        self.get(Counter::RecordsWritten)
    }

    pub fn database_errors(&self) -> u64 {
        self.get(Counter::DatabaseErrors)
    }

    /// Reads all six counters.  The reads are individually atomic; the
    /// snapshot as a whole is not.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            records_read: self.records_read(),
            records_processed: self.records_processed(),
            test_orders_received: self.test_orders_received(),
            results_received: self.results_received(),
            records_written: self.records_written(),
            database_errors: self.database_errors(),
        }
    }

    /// Returns a receiver for every future [`CounterChange`].
    pub fn subscribe(&self) -> broadcast::Receiver<CounterChange> {
        self.changes.subscribe()
    }
}

impl Default for StatisticsTracker {
    fn default() -> Self {
        Self::new()
    }
}
