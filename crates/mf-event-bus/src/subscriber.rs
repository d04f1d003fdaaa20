//! # Event Subscriber
//!
//! Defines the subscription side of the event bus: callback handles, the
//! registry record for one subscription, and the module-scoped client that
//! remotes use to talk to the bus.

use crate::bus::{BusError, EventBus};
use crate::events::Payload;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

type CallbackFn = dyn Fn(&Payload) -> anyhow::Result<()> + Send + Sync;

/// Shared handle to a subscriber callback.
///
/// Identity is the handle itself: clones compare equal, two handles built
/// from separate closures never do. A module removes a subscription by
/// presenting a clone of the handle it registered.
#[derive(Clone)]
pub struct Callback {
    inner: Arc<CallbackFn>,
}

impl Callback {
    /// Wrap a fallible callback. Returning `Err` counts as a subscriber fault.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Payload) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Wrap a callback that cannot report failure.
    pub fn infallible<F>(f: F) -> Self
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        Self::new(move |payload| {
            f(payload);
            Ok(())
        })
    }

    /// Check whether both handles refer to the same callback.
    #[must_use]
    pub fn same_as(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn invoke(&self, payload: &Payload) -> anyhow::Result<()> {
        (self.inner)(payload)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Callback {}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("ptr", &Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

/// One registration in the subscriber registry.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Event name the callback listens to.
    pub event: String,

    /// The registered callback.
    pub callback: Callback,

    /// Module that owns the registration.
    pub module_id: String,
}

impl Subscription {
    pub(crate) fn new(event: &str, callback: Callback, module_id: &str) -> Self {
        Self {
            event: event.to_string(),
            callback,
            module_id: module_id.to_string(),
        }
    }

    /// Check whether this registration was made with the given callback and module.
    #[must_use]
    pub fn matches(&self, callback: &Callback, module_id: &str) -> bool {
        self.module_id == module_id && self.callback.same_as(callback)
    }
}

/// Handle that removes its subscription when dropped.
///
/// Tie it to a module's mounted lifetime so that unmounting always unsubscribes.
#[must_use = "dropping the guard immediately removes the subscription"]
pub struct SubscriptionGuard {
    bus: Arc<EventBus>,
    event: String,
    callback: Callback,
    module_id: String,
    active: bool,
}

impl SubscriptionGuard {
    /// Event name of the guarded subscription.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Module owning the guarded subscription.
    #[must_use]
    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// Remove the subscription now instead of at drop.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Err(e) = self.bus.off(&self.event, &self.callback, &self.module_id) {
            warn!(event = %self.event, module = %self.module_id, error = %e, "Guard release failed");
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("event", &self.event)
            .field("module_id", &self.module_id)
            .field("active", &self.active)
            .finish()
    }
}

/// Bus reference bound to one module id.
///
/// Every operation is attributed to the bound module, the way a remote passes
/// its own id on each call.
#[derive(Clone)]
pub struct ModuleClient {
    bus: Arc<EventBus>,
    module_id: String,
}

impl ModuleClient {
    /// Bind a bus reference to a module id.
    pub fn new(bus: Arc<EventBus>, module_id: impl Into<String>) -> Self {
        Self {
            bus,
            module_id: module_id.into(),
        }
    }

    /// The bound module id.
    #[must_use]
    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// The shared bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Emit an event with this module as the source.
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidEventName` for a blank event name.
    pub fn emit(&self, event: &str, payload: Payload) -> Result<(), BusError> {
        self.bus.emit(event, payload, Some(&self.module_id))
    }

    /// Subscribe for as long as the returned guard lives.
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidEventName` for a blank event name.
    pub fn subscribe(&self, event: &str, callback: Callback) -> Result<SubscriptionGuard, BusError> {
        self.bus.on(event, callback.clone(), &self.module_id)?;
        debug!(event = %event, module = %self.module_id, "Guarded subscription created");
        Ok(SubscriptionGuard {
            bus: Arc::clone(&self.bus),
            event: event.to_string(),
            callback,
            module_id: self.module_id.clone(),
            active: true,
        })
    }

    /// Latest payload emitted for an event, if any.
    #[must_use]
    pub fn current_state(&self, event: &str) -> Option<Payload> {
        self.bus.get_current_state(event)
    }
}

impl fmt::Debug for ModuleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleClient")
            .field("module_id", &self.module_id)
            .finish()
    }
}
