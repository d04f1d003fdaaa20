//! # Module Registry - Mounting Independently Deployed Modules
//!
//! Modules are mounted in registration order and unmounted in reverse. Every
//! module resolves the shared bus through the well-known slot at mount time
//! and talks to other modules ONLY through it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       ModuleRegistry                            │
//! │                                                                 │
//! │  ┌──────────┐  ┌──────────────┐  ┌──────────────────────┐       │
//! │  │ shop-mf  │  │ dashboard-mf │  │ event-bus-monitor-mf │       │
//! │  │ MOUNTED  │  │   MOUNTED    │  │       DISABLED       │       │
//! │  └────┬─────┘  └──────┬───────┘  └──────────────────────┘       │
//! │       │               │                                         │
//! │       └───────────────┴────────────┐                            │
//! │                                    ▼                            │
//! │                          ┌─────────────────┐                    │
//! │                          │    BusSlot      │                    │
//! │                          │  (EventBus)     │                    │
//! │                          └─────────────────┘                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//!
//! ```text
//! MF_MODULE_SHOP_MF=true
//! MF_MODULE_DASHBOARD_MF=true
//! MF_MODULE_EVENT_BUS_MONITOR_MF=false
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mf_event_bus::{BusError, BusSlot, LocatorError, ModuleClient};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{error, info, warn};

/// Module lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Not registered.
    NotRegistered,
    /// Registered but not mounted.
    Registered,
    /// Mounted and attached to the bus.
    Mounted,
    /// Unmounted gracefully.
    Unmounted,
    /// Mount failed.
    Failed,
    /// Disabled by configuration.
    Disabled,
}

/// Module errors.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module could not attach itself.
    #[error("[{module}] mount failed: {message}")]
    MountFailed { module: String, message: String },

    /// An operation needs the module to be mounted first.
    #[error("[{module}] module is not mounted")]
    NotMounted { module: String },

    /// A module with the same id is already registered.
    #[error("[{module}] module is already registered")]
    Duplicate { module: String },

    /// User-supplied input could not be used.
    #[error("[{module}] invalid input: {message}")]
    InvalidInput { module: String, message: String },

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Locator(#[from] LocatorError),
}

/// Contract every loaded module fulfils.
///
/// The remote loader that fetches and instantiates bundles is outside this
/// crate; what it hands over is something implementing this trait.
#[async_trait]
pub trait RemoteModule: Send + Sync {
    /// Stable module id, used as the owning module on every bus call.
    fn id(&self) -> &str;

    /// Attach to the bus. Subscriptions taken here live until `unmount`.
    async fn mount(&self, client: ModuleClient) -> Result<(), ModuleError>;

    /// Detach from the bus, releasing every subscription.
    async fn unmount(&self) -> Result<(), ModuleError>;
}

/// Configuration for which modules are enabled.
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    /// Explicit switches by module id. Modules not listed are enabled.
    pub enabled: HashMap<String, bool>,
}

impl ModuleConfig {
    /// Check if a module is enabled.
    #[must_use]
    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.get(id).copied().unwrap_or(true)
    }

    /// Disable a module.
    pub fn disable(&mut self, id: &str) {
        self.enabled.insert(id.to_string(), false);
    }

    /// Environment key controlling a module, e.g. `MF_MODULE_SHOP_MF`.
    #[must_use]
    pub fn env_key(id: &str) -> String {
        format!("MF_MODULE_{}", id.to_uppercase().replace('-', "_"))
    }

    /// Read switches for the given module ids through a key lookup.
    pub fn from_lookup<F>(ids: &[&str], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        for id in ids {
            if let Some(val) = lookup(&Self::env_key(id)) {
                let val = val.trim().to_lowercase();
                let enabled = matches!(val.as_str(), "1" | "true" | "yes" | "on");
                config.enabled.insert((*id).to_string(), enabled);
            }
        }
        config
    }
}

/// The central module registry.
pub struct ModuleRegistry {
    /// Registered modules in mount order.
    modules: RwLock<Vec<Arc<dyn RemoteModule>>>,
    /// Module status by id.
    status: RwLock<HashMap<String, ModuleStatus>>,
    /// Configuration.
    config: ModuleConfig,
}

impl ModuleRegistry {
    /// Create a new registry with the given configuration.
    pub fn new(config: ModuleConfig) -> Self {
        Self {
            modules: RwLock::new(Vec::new()),
            status: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a module. Disabled modules are recorded but never mounted.
    pub fn register(&self, module: Arc<dyn RemoteModule>) -> Result<(), ModuleError> {
        let id = module.id().to_string();

        if !self.config.is_enabled(&id) {
            info!("[Registry] Skipping disabled module: {}", id);
            self.status.write().insert(id, ModuleStatus::Disabled);
            return Ok(());
        }

        let mut modules = self.modules.write();
        if modules.iter().any(|m| m.id() == id) {
            return Err(ModuleError::Duplicate { module: id });
        }

        info!("[Registry] Registering module: {}", id);
        modules.push(module);
        self.status.write().insert(id, ModuleStatus::Registered);
        Ok(())
    }

    /// Mount every registered module against the bus in `slot`.
    ///
    /// A module that fails to mount is unmounted again to release anything it
    /// attached, then marked `Failed`; its error is returned alongside the
    /// others so the host can report them.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::Locator` if no bus has been published to `slot`.
    pub async fn mount_all(&self, slot: &BusSlot) -> Result<Vec<ModuleError>, ModuleError> {
        let bus = slot.get()?;
        let modules = self.modules.read().clone();
        let mut failures = Vec::new();

        for module in &modules {
            let id = module.id().to_string();
            if self.status(&id) == ModuleStatus::Mounted {
                continue;
            }

            info!("[Registry] Mounting {}", id);
            let client = ModuleClient::new(Arc::clone(&bus), id.clone());
            match module.mount(client).await {
                Ok(()) => {
                    self.status.write().insert(id, ModuleStatus::Mounted);
                }
                Err(e) => {
                    error!("[Registry] Failed to mount {}: {}", id, e);
                    // Release whatever the module attached before failing.
                    if let Err(cleanup) = module.unmount().await {
                        warn!("[Registry] Cleanup of {} reported: {}", id, cleanup);
                    }
                    self.status.write().insert(id, ModuleStatus::Failed);
                    failures.push(e);
                }
            }
        }

        Ok(failures)
    }

    /// Unmount every mounted module in reverse mount order.
    pub async fn unmount_all(&self) -> Vec<ModuleError> {
        let modules = self.modules.read().clone();
        let mut errors = Vec::new();

        for module in modules.iter().rev() {
            let id = module.id().to_string();
            if self.status(&id) != ModuleStatus::Mounted {
                continue;
            }

            info!("[Registry] Unmounting {}", id);
            if let Err(e) = module.unmount().await {
                warn!("[Registry] Unmount of {} reported: {}", id, e);
                errors.push(e);
            }
            self.status.write().insert(id, ModuleStatus::Unmounted);
        }

        errors
    }

    /// Get the status of a module.
    #[must_use]
    pub fn status(&self, id: &str) -> ModuleStatus {
        self.status
            .read()
            .get(id)
            .copied()
            .unwrap_or(ModuleStatus::NotRegistered)
    }

    /// Ids of mounted modules in mount order.
    #[must_use]
    pub fn mounted_ids(&self) -> Vec<String> {
        self.modules
            .read()
            .iter()
            .map(|m| m.id().to_string())
            .filter(|id| self.status(id) == ModuleStatus::Mounted)
            .collect()
    }
}
