//! # Event Bus Monitor Module
//!
//! Observability panel for the bus. Holds no subscriptions: it polls the
//! history, current state and subscriber set on a timer, and lets an operator
//! send events by hand.

use async_trait::async_trait;
use mf_event_bus::{emit_rate, BusStatistics, LogEntry, ModuleClient, Payload};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::{ModuleError, RemoteModule};

/// Module id of the monitor.
pub const MONITOR_MODULE_ID: &str = "event-bus-monitor-mf";

/// Shortest period the poller will tick at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One poll of the monitor panels.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSample {
    /// Bus counters at the time of the poll.
    pub statistics: BusStatistics,
    /// EMIT records newer than the previous poll.
    pub emits_since_last_poll: usize,
}

#[derive(Default)]
pub struct MonitorModule {
    client: Mutex<Option<ModuleClient>>,
    last_poll_ms: Mutex<u64>,
}

impl MonitorModule {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<ModuleClient, ModuleError> {
        self.client.lock().clone().ok_or_else(|| ModuleError::NotMounted {
            module: MONITOR_MODULE_ID.to_string(),
        })
    }

    /// Emit an event typed in by an operator. `data` must be JSON text.
    pub fn send_manual_event(&self, name: &str, data: &str) -> Result<(), ModuleError> {
        let client = self.client()?;
        let payload: Payload =
            serde_json::from_str(data).map_err(|e| ModuleError::InvalidInput {
                module: MONITOR_MODULE_ID.to_string(),
                message: format!("payload is not valid JSON: {e}"),
            })?;

        client.emit(name, payload)?;
        info!(event = %name, "Manual event sent");
        Ok(())
    }

    /// Audit log, optionally for one event name.
    pub fn event_log(&self, event: Option<&str>) -> Result<Vec<LogEntry>, ModuleError> {
        Ok(self.client()?.bus().get_event_history(event))
    }

    /// Current state of every event name seen in the audit log.
    pub fn current_states(&self) -> Result<Vec<(String, Option<Payload>)>, ModuleError> {
        let client = self.client()?;
        let bus = client.bus();
        let mut names: Vec<String> = bus
            .get_event_history(None)
            .into_iter()
            .map(|entry| entry.event)
            .collect();
        names.sort();
        names.dedup();

        Ok(names
            .into_iter()
            .map(|name| {
                let state = bus.get_current_state(&name);
                (name, state)
            })
            .collect())
    }

    /// Poll the bus once.
    pub fn sample(&self) -> Result<MonitorSample, ModuleError> {
        let client = self.client()?;
        let bus = client.bus();
        let now = current_timestamp_ms();

        let mut last_poll = self.last_poll_ms.lock();
        let history = bus.get_event_history(None);
        let sample = MonitorSample {
            statistics: BusStatistics::collect(bus),
            emits_since_last_poll: emit_rate(&history, *last_poll),
        };
        *last_poll = now;
        Ok(sample)
    }

    /// Poll on an interval until `shutdown` flips to `true`.
    ///
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn spawn_poller(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let period = interval.max(MIN_POLL_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match monitor.sample() {
                            Ok(sample) => debug!(
                                entries = sample.statistics.total_entries,
                                active_modules = sample.statistics.active_modules,
                                emits = sample.emits_since_last_poll,
                                "Bus sample"
                            ),
                            Err(ModuleError::NotMounted { .. }) => {}
                            Err(e) => debug!(error = %e, "Bus sample failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Monitor poller stopped");
        })
    }
}

#[async_trait]
impl RemoteModule for MonitorModule {
    fn id(&self) -> &str {
        MONITOR_MODULE_ID
    }

    async fn mount(&self, client: ModuleClient) -> Result<(), ModuleError> {
        *self.client.lock() = Some(client);
        Ok(())
    }

    async fn unmount(&self) -> Result<(), ModuleError> {
        *self.client.lock() = None;
        Ok(())
    }
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
