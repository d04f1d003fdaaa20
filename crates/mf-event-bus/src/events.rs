//! # Audit Records
//!
//! Defines the records the bus appends to its event log and the opaque
//! payload type carried by every emission.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque data attached to one emission.
///
/// Modules agree on the shape per event name; the bus never inspects it.
/// An emission without data carries `Value::Null`.
pub type Payload = serde_json::Value;

/// Kind of bus activity an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogKind {
    /// An event was emitted.
    Emit,
    /// A callback was registered.
    Subscribe,
    /// A callback was removed.
    Unsubscribe,
    /// A callback completed without fault.
    Handled,
}

impl LogKind {
    /// Wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emit => "EMIT",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Handled => "HANDLED",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record in the bus audit log.
///
/// Serialized as `{"timestamp", "type", "event", "moduleId", "data"}`, the
/// shape front-end monitors read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Milliseconds since the Unix epoch when the record was appended.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,

    /// What happened.
    #[serde(rename = "type")]
    pub kind: LogKind,

    /// Event name the activity concerns.
    pub event: String,

    /// Module that acted: the emitter for EMIT, the subscriber otherwise.
    pub module_id: String,

    /// Payload for EMIT and HANDLED records.
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl LogEntry {
    /// Create a record stamped with the current time.
    pub fn new(
        kind: LogKind,
        event: impl Into<String>,
        module_id: impl Into<String>,
        payload: Option<Payload>,
    ) -> Self {
        Self {
            timestamp_ms: current_timestamp_ms(),
            kind,
            event: event.into(),
            module_id: module_id.into(),
            payload,
        }
    }

    /// Check whether this record concerns the given event name.
    #[must_use]
    pub fn is_for(&self, event: &str) -> bool {
        self.event == event
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} -> {}",
            self.timestamp_ms, self.kind, self.module_id, self.event
        )?;
        if let Some(payload) = &self.payload {
            write!(f, " {payload}")?;
        }
        Ok(())
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
