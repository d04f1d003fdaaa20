//! # Event Bus
//!
//! The process-wide publish/subscribe hub.
//!
//! ## Dispatch Order
//!
//! 1. Cache the payload as the event's current state
//! 2. Append an EMIT record (when logging is enabled)
//! 3. Snapshot the subscriber list
//! 4. Invoke every snapshotted callback, isolating each one's fault
//!
//! The internal lock is released before step 4, so callbacks may re-enter
//! `emit`, `on` and `off`. Subscriptions added during a dispatch are not
//! invoked by that dispatch.

use crate::config::{BusConfig, LogLevel};
use crate::events::{LogEntry, LogKind, Payload};
use crate::history::EventLog;
use crate::subscriber::{Callback, Subscription};
use crate::UNKNOWN_SOURCE;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors from bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Event names must contain at least one non-whitespace character.
    #[error("event name must not be empty")]
    InvalidEventName,
}

/// Result of delivering one emission to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The callback completed.
    Handled { module_id: String },
    /// The callback returned an error or panicked.
    Faulted { module_id: String, reason: String },
}

impl DeliveryOutcome {
    /// Module the outcome belongs to.
    #[must_use]
    pub fn module_id(&self) -> &str {
        match self {
            Self::Handled { module_id } | Self::Faulted { module_id, .. } => module_id,
        }
    }

    /// Check whether the callback completed.
    #[must_use]
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }
}

/// Per-subscriber outcomes of one emission, in invocation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Event that was emitted.
    pub event: String,
    /// One outcome per snapshotted subscription.
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    /// Number of callbacks that completed.
    #[must_use]
    pub fn handled_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_handled()).count()
    }

    /// Number of callbacks that faulted.
    #[must_use]
    pub fn fault_count(&self) -> usize {
        self.outcomes.len() - self.handled_count()
    }

    /// Check whether every callback completed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(DeliveryOutcome::is_handled)
    }
}

/// Mutable bus state, only touched under the bus lock.
struct BusState {
    /// Event name -> subscriptions in registration order. No empty lists.
    subscribers: HashMap<String, Vec<Subscription>>,

    /// Event name -> most recently emitted payload.
    current_state: HashMap<String, Payload>,

    /// Bounded audit trail.
    history: EventLog,
}

/// In-memory event bus shared by every loaded module.
pub struct EventBus {
    /// Immutable configuration.
    config: BusConfig,

    /// Registry, state cache and audit log.
    state: Mutex<BusState>,

    /// Total emit calls accepted.
    events_published: AtomicU64,
}

impl EventBus {
    /// Create a bus with the given configuration.
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        let history = EventLog::new(config.max_history_size);
        debug!(
            max_history_size = config.max_history_size,
            enable_logging = config.enable_logging,
            log_level = %config.log_level,
            "Event bus created"
        );
        Self {
            config,
            state: Mutex::new(BusState {
                subscribers: HashMap::new(),
                current_state: HashMap::new(),
                history,
            }),
            events_published: AtomicU64::new(0),
        }
    }

    /// The configuration the bus was built with.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Emit an event to every current subscriber.
    ///
    /// `source` defaults to `"unknown"`. Subscriber faults are logged and
    /// swallowed; the emitter never sees them.
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidEventName` for a blank event name, before any
    /// state is touched.
    pub fn emit(&self, event: &str, payload: Payload, source: Option<&str>) -> Result<(), BusError> {
        self.emit_with_report(event, payload, source).map(|_| ())
    }

    /// Emit an event and return what happened at each subscriber.
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidEventName` for a blank event name.
    pub fn emit_with_report(
        &self,
        event: &str,
        payload: Payload,
        source: Option<&str>,
    ) -> Result<DispatchReport, BusError> {
        validate_event_name(event)?;
        let source = source.unwrap_or(UNKNOWN_SOURCE);

        self.events_published.fetch_add(1, Ordering::Relaxed);

        let snapshot: Vec<Subscription> = {
            let mut state = self.state.lock();
            state.current_state.insert(event.to_string(), payload.clone());
            if self.config.enable_logging {
                self.record(&mut state, LogKind::Emit, event, source, Some(payload.clone()));
            }
            state.subscribers.get(event).cloned().unwrap_or_default()
        };

        let mut outcomes = Vec::with_capacity(snapshot.len());
        for subscription in snapshot {
            outcomes.push(self.deliver(&subscription, &payload));
        }

        Ok(DispatchReport {
            event: event.to_string(),
            outcomes,
        })
    }

    /// Invoke one callback behind its own error boundary.
    fn deliver(&self, subscription: &Subscription, payload: &Payload) -> DeliveryOutcome {
        let module_id = subscription.module_id.clone();
        let result = catch_unwind(AssertUnwindSafe(|| subscription.callback.invoke(payload)));

        let reason = match result {
            Ok(Ok(())) => {
                if self.config.enable_logging {
                    let mut state = self.state.lock();
                    self.record(
                        &mut state,
                        LogKind::Handled,
                        &subscription.event,
                        &module_id,
                        Some(payload.clone()),
                    );
                }
                return DeliveryOutcome::Handled { module_id };
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => panic_reason(panic.as_ref()),
        };

        error!(
            event = %subscription.event,
            module = %module_id,
            reason = %reason,
            "Subscriber callback failed"
        );
        DeliveryOutcome::Faulted { module_id, reason }
    }

    /// Register a callback for an event on behalf of a module.
    ///
    /// Duplicate registrations are kept and invoked independently.
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidEventName` for a blank event name.
    pub fn on(&self, event: &str, callback: Callback, module_id: &str) -> Result<(), BusError> {
        validate_event_name(event)?;

        let mut state = self.state.lock();
        if self.config.enable_logging {
            self.record(&mut state, LogKind::Subscribe, event, module_id, None);
        }
        state
            .subscribers
            .entry(event.to_string())
            .or_default()
            .push(Subscription::new(event, callback, module_id));
        Ok(())
    }

    /// Remove the first registration matching `(event, callback, module_id)`.
    ///
    /// Removing something that is not registered is a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidEventName` for a blank event name.
    pub fn off(&self, event: &str, callback: &Callback, module_id: &str) -> Result<(), BusError> {
        validate_event_name(event)?;

        let mut state = self.state.lock();
        let Some(list) = state.subscribers.get_mut(event) else {
            debug!(event = %event, module = %module_id, "Nothing to unsubscribe");
            return Ok(());
        };
        let Some(index) = list.iter().position(|s| s.matches(callback, module_id)) else {
            debug!(event = %event, module = %module_id, "Nothing to unsubscribe");
            return Ok(());
        };

        list.remove(index);
        if list.is_empty() {
            state.subscribers.remove(event);
        }
        if self.config.enable_logging {
            self.record(&mut state, LogKind::Unsubscribe, event, module_id, None);
        }
        Ok(())
    }

    /// Copy of the audit log, oldest first, optionally for one event name.
    #[must_use]
    pub fn get_event_history(&self, event: Option<&str>) -> Vec<LogEntry> {
        let state = self.state.lock();
        match event {
            Some(name) => state.history.snapshot_for(name),
            None => state.history.snapshot(),
        }
    }

    /// Latest payload emitted for an event, or `None` if it was never emitted.
    #[must_use]
    pub fn get_current_state(&self, event: &str) -> Option<Payload> {
        self.state.lock().current_state.get(event).cloned()
    }

    /// Unique module ids subscribed to one event, or to any event.
    #[must_use]
    pub fn get_subscribers(&self, event: Option<&str>) -> BTreeSet<String> {
        let state = self.state.lock();
        match event {
            Some(name) => state
                .subscribers
                .get(name)
                .map(|list| list.iter().map(|s| s.module_id.clone()).collect())
                .unwrap_or_default(),
            None => state
                .subscribers
                .values()
                .flatten()
                .map(|s| s.module_id.clone())
                .collect(),
        }
    }

    /// Empty the audit log. State cache and registry are untouched.
    pub fn clear_history(&self) {
        self.state.lock().history.clear();
        debug!("Event history cleared");
    }

    /// Check whether any subscription exists for an event.
    #[must_use]
    pub fn has_listeners(&self, event: &str) -> bool {
        self.state.lock().subscribers.contains_key(event)
    }

    /// Number of registrations for an event, duplicates included.
    #[must_use]
    pub fn subscription_count(&self, event: &str) -> usize {
        self.state
            .lock()
            .subscribers
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Event names with a cached current state, sorted.
    #[must_use]
    pub fn tracked_events(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().current_state.keys().cloned().collect();
        names.sort();
        names
    }

    /// Total emit calls accepted since creation.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    fn record(
        &self,
        state: &mut BusState,
        kind: LogKind,
        event: &str,
        module_id: &str,
        payload: Option<Payload>,
    ) {
        let entry = LogEntry::new(kind, event, module_id, payload);
        let level = self.config.log_level;
        if level.mirrors_audit() {
            if level == LogLevel::Debug {
                debug!(kind = %entry.kind, module = %entry.module_id, event = %entry.event, payload = ?entry.payload, "Bus activity");
            } else {
                info!(kind = %entry.kind, module = %entry.module_id, event = %entry.event, "Bus activity");
            }
        }
        state.history.push(entry);
    }

    /// Run `f` against the audit log under the bus lock.
    pub(crate) fn with_history<R>(&self, f: impl FnOnce(&EventLog) -> R) -> R {
        f(&self.state.lock().history)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("events_published", &self.events_published())
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

fn validate_event_name(event: &str) -> Result<(), BusError> {
    if event.trim().is_empty() {
        return Err(BusError::InvalidEventName);
    }
    Ok(())
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
