//! # Dashboard Module
//!
//! Shows the current user and counts user actions reported by other modules.
//!
//! - Subscribes: `userUpdated` (any payload), `userAction` (any payload)

use async_trait::async_trait;
use mf_event_bus::{Callback, ModuleClient, Payload, SubscriptionGuard};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use super::{USER_ACTION, USER_UPDATED};
use crate::registry::{ModuleError, RemoteModule};

/// Module id of the dashboard.
pub const DASHBOARD_MODULE_ID: &str = "dashboard-mf";

#[derive(Default)]
pub struct DashboardModule {
    guards: Mutex<Vec<SubscriptionGuard>>,
    user: Arc<Mutex<Option<Payload>>>,
    actions_seen: Arc<AtomicU64>,
}

impl DashboardModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest user record, recovered at mount or received since.
    #[must_use]
    pub fn user(&self) -> Option<Payload> {
        self.user.lock().clone()
    }

    /// `userAction` events received while mounted.
    #[must_use]
    pub fn actions_seen(&self) -> u64 {
        self.actions_seen.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RemoteModule for DashboardModule {
    fn id(&self) -> &str {
        DASHBOARD_MODULE_ID
    }

    async fn mount(&self, client: ModuleClient) -> Result<(), ModuleError> {
        let user = Arc::clone(&self.user);
        let on_user = Callback::infallible(move |payload| {
            info!(module = DASHBOARD_MODULE_ID, user = %payload, "User updated");
            *user.lock() = Some(payload.clone());
        });

        let actions = Arc::clone(&self.actions_seen);
        let on_action = Callback::infallible(move |_| {
            actions.fetch_add(1, Ordering::Relaxed);
        });

        let mut guards = self.guards.lock();
        guards.push(client.subscribe(USER_UPDATED, on_user)?);
        guards.push(client.subscribe(USER_ACTION, on_action)?);

        if let Some(last) = client.current_state(USER_UPDATED) {
            info!(module = DASHBOARD_MODULE_ID, user = %last, "Recovered last user at mount");
            *self.user.lock() = Some(last);
        }
        Ok(())
    }

    async fn unmount(&self) -> Result<(), ModuleError> {
        self.guards.lock().clear();
        Ok(())
    }
}
