//! # Bounded Event Log
//!
//! Ring buffer holding the bus audit trail.
//!
//! ## Design
//!
//! - Records are kept in chronological order, oldest first
//! - When the configured maximum is exceeded the oldest record is evicted
//! - Memory is bounded by `max_entries` regardless of bus traffic

use crate::events::{LogEntry, LogKind};
use std::collections::VecDeque;

/// Fixed-capacity FIFO log of bus activity.
#[derive(Debug, Clone)]
pub struct EventLog {
    /// Records, oldest at the front.
    entries: VecDeque<LogEntry>,

    /// Maximum number of records kept.
    max_entries: usize,

    /// Records evicted since creation or the last clear.
    evicted: u64,
}

impl EventLog {
    /// Upper bound on the initial allocation, whatever the configured size.
    const MAX_PREALLOCATED: usize = 1024;

    /// Create a log keeping at most `max_entries` records.
    ///
    /// A maximum of zero is clamped to one.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: VecDeque::with_capacity(max_entries.min(Self::MAX_PREALLOCATED)),
            max_entries,
            evicted: 0,
        }
    }

    /// Append a record, evicting the oldest when over capacity.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
            self.evicted += 1;
        }
    }

    /// Copy of every record, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Copy of the records for one event name, oldest first.
    #[must_use]
    pub fn snapshot_for(&self, event: &str) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.is_for(event))
            .cloned()
            .collect()
    }

    /// Number of records of the given kind currently held.
    #[must_use]
    pub fn count_kind(&self, kind: LogKind) -> usize {
        self.entries.iter().filter(|entry| entry.kind == kind).count()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.evicted = 0;
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records evicted to stay within capacity.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
