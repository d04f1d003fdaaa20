//! # Bus Locator
//!
//! The well-known slot through which independently loaded modules resolve the
//! one shared bus.
//!
//! Contract: the host constructs the bus once and publishes it once; modules
//! read it any number of times and always receive the same instance. Reading
//! before publication fails explicitly instead of handing out a fresh bus.

use crate::bus::EventBus;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from slot operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// The host has not published a bus yet.
    #[error("event bus has not been published by the host")]
    MissingBusReference,

    /// A bus was already published to this slot.
    #[error("event bus has already been published")]
    AlreadyPublished,
}

/// Publish-once cell holding a bus reference.
#[derive(Debug, Default)]
pub struct BusSlot {
    cell: OnceLock<Arc<EventBus>>,
}

impl BusSlot {
    /// Create an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Publish the bus. Only the first call succeeds.
    ///
    /// # Errors
    ///
    /// Returns `LocatorError::AlreadyPublished` if a bus is already in the slot;
    /// the slot keeps the first instance.
    pub fn publish(&self, bus: Arc<EventBus>) -> Result<Arc<EventBus>, LocatorError> {
        match self.cell.set(bus) {
            Ok(()) => {
                info!("Event bus published");
                self.get()
            }
            Err(_) => {
                warn!("Rejected second event bus publication");
                Err(LocatorError::AlreadyPublished)
            }
        }
    }

    /// Resolve the published bus.
    ///
    /// # Errors
    ///
    /// Returns `LocatorError::MissingBusReference` before publication.
    pub fn get(&self) -> Result<Arc<EventBus>, LocatorError> {
        self.cell
            .get()
            .cloned()
            .ok_or(LocatorError::MissingBusReference)
    }

    /// Check whether a bus has been published.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// The process-wide slot.
static GLOBAL_SLOT: BusSlot = BusSlot::new();

/// The process-wide slot itself, for callers that take a `&BusSlot`.
#[must_use]
pub fn global_slot() -> &'static BusSlot {
    &GLOBAL_SLOT
}

/// Publish the bus to the process-wide slot.
///
/// # Errors
///
/// Returns `LocatorError::AlreadyPublished` on any call after the first.
pub fn publish_global(bus: Arc<EventBus>) -> Result<Arc<EventBus>, LocatorError> {
    GLOBAL_SLOT.publish(bus)
}

/// Resolve the bus from the process-wide slot.
///
/// # Errors
///
/// Returns `LocatorError::MissingBusReference` until the host publishes.
pub fn global_bus() -> Result<Arc<EventBus>, LocatorError> {
    GLOBAL_SLOT.get()
}
