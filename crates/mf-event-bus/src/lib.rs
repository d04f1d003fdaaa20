//! # MF Event Bus - Cross-Module Communication for Micro-Frontends
//!
//! The only sanctioned channel between independently built and deployed
//! front-end modules. Modules never import each other; they publish and
//! subscribe by event name through one process-wide bus.
//!
//! ## Rules
//!
//! - **All cross-module communication goes through the bus**
//! - Payloads are opaque JSON values; shapes are agreed per event name outside the bus
//! - One bus per process, resolved through the well-known slot (see [`locator`])
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │   shop-mf    │                    │ dashboard-mf │
//! │              │      emit()        │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │ state + log  │ ─────────┘
//!                  └──────────────┘     on()
//! ```
//!
//! ## Guarantees
//!
//! - **Current state:** the last payload per event name is cached before delivery,
//!   so late subscribers can recover it
//! - **Audit log:** bounded ring buffer of EMIT/SUBSCRIBE/UNSUBSCRIBE/HANDLED records
//! - **Fault isolation:** a failing or panicking callback never stops delivery to
//!   the remaining subscribers and never reaches the emitter

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod config;
pub mod events;
pub mod history;
pub mod locator;
pub mod monitor;
pub mod subscriber;

// Re-export main types
pub use bus::{BusError, DeliveryOutcome, DispatchReport, EventBus};
pub use config::{BusConfig, BusConfigOverrides, ConfigError, LogLevel};
pub use events::{LogEntry, LogKind, Payload};
pub use history::EventLog;
pub use locator::{global_bus, global_slot, publish_global, BusSlot, LocatorError};
pub use monitor::{emit_rate, BusStatistics};
pub use subscriber::{Callback, ModuleClient, Subscription, SubscriptionGuard};

/// Module id recorded when an emitter does not identify itself.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Default number of audit records kept before the oldest is evicted.
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 100;
