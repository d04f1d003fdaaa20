//! Polling-based bus statistics for monitoring modules.
//!
//! The bus pushes no meta-events about its own activity. Observers call
//! [`BusStatistics::collect`] on their own schedule instead.

use crate::bus::EventBus;
use crate::events::{LogEntry, LogKind};
use serde::Serialize;

/// Point-in-time summary of bus activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusStatistics {
    /// Records currently in the audit log.
    pub total_entries: usize,
    /// EMIT records in the log.
    pub emits: usize,
    /// HANDLED records in the log.
    pub handled: usize,
    /// SUBSCRIBE records in the log.
    pub subscribes: usize,
    /// UNSUBSCRIBE records in the log.
    pub unsubscribes: usize,
    /// Records dropped to stay within the history bound since the last clear.
    pub evicted_entries: u64,
    /// Distinct modules holding at least one subscription.
    pub active_modules: usize,
    /// Event names with a cached current state.
    pub tracked_events: usize,
    /// Emit calls since the bus was created, independent of log eviction.
    pub events_published: u64,
}

impl BusStatistics {
    /// Poll the bus once.
    #[must_use]
    pub fn collect(bus: &EventBus) -> Self {
        let mut stats = bus.with_history(|log| Self {
            total_entries: log.len(),
            emits: log.count_kind(LogKind::Emit),
            handled: log.count_kind(LogKind::Handled),
            subscribes: log.count_kind(LogKind::Subscribe),
            unsubscribes: log.count_kind(LogKind::Unsubscribe),
            evicted_entries: log.evicted(),
            ..Self::default()
        });
        stats.active_modules = bus.get_subscribers(None).len();
        stats.tracked_events = bus.tracked_events().len();
        stats.events_published = bus.events_published();
        stats
    }
}

/// Count EMIT records newer than `since_ms`.
///
/// Called with the timestamp of the previous poll this gives the number of
/// emissions in the polling window.
#[must_use]
pub fn emit_rate(history: &[LogEntry], since_ms: u64) -> usize {
    history
        .iter()
        .filter(|entry| entry.kind == LogKind::Emit && entry.timestamp_ms > since_ms)
        .count()
}
