//! # Host Shell Library
//!
//! This library exposes the host runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (from env)
//! 2. Construct the event bus exactly once
//! 3. Publish it to the well-known slot
//! 4. Mount modules in registration order; each resolves the bus from the slot
//! 5. Run until shutdown, then unmount in reverse order

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod modules;
pub mod registry;

pub use config::{HostConfig, MonitorConfig};
pub use registry::{ModuleConfig, ModuleError, ModuleRegistry, ModuleStatus, RemoteModule};

use std::sync::Arc;

use mf_event_bus::{BusSlot, BusStatistics, EventBus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::modules::{DashboardModule, MonitorModule, ShopModule};

/// Handles to the built-in modules, for driving them after mount.
#[derive(Clone)]
pub struct BuiltinModules {
    pub shop: Arc<ShopModule>,
    pub dashboard: Arc<DashboardModule>,
    pub monitor: Arc<MonitorModule>,
}

impl BuiltinModules {
    pub fn new() -> Self {
        Self {
            shop: Arc::new(ShopModule::new()),
            dashboard: Arc::new(DashboardModule::new()),
            monitor: Arc::new(MonitorModule::new()),
        }
    }

    /// Register every built-in module in mount order.
    pub fn register_all(&self, registry: &ModuleRegistry) -> Result<(), ModuleError> {
        registry.register(Arc::clone(&self.shop) as Arc<dyn RemoteModule>)?;
        registry.register(Arc::clone(&self.dashboard) as Arc<dyn RemoteModule>)?;
        registry.register(Arc::clone(&self.monitor) as Arc<dyn RemoteModule>)?;
        Ok(())
    }
}

impl Default for BuiltinModules {
    fn default() -> Self {
        Self::new()
    }
}

/// The host runtime owning the bus and the mounted modules.
pub struct HostRuntime {
    /// Configuration.
    config: HostConfig,
    /// The one bus instance for this process.
    bus: Arc<EventBus>,
    /// Module registry.
    registry: ModuleRegistry,
    /// Built-in module handles.
    builtins: BuiltinModules,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl HostRuntime {
    /// Create the runtime and its bus. Nothing is published or mounted yet.
    pub fn new(config: HostConfig) -> Result<Self, ModuleError> {
        info!("Creating micro-frontend host runtime");

        let bus = Arc::new(EventBus::new(config.bus.clone()));
        let registry = ModuleRegistry::new(config.modules.clone());
        let builtins = BuiltinModules::new();
        builtins.register_all(&registry)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            bus,
            registry,
            builtins,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// The bus owned by this runtime.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The module registry.
    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Built-in module handles.
    #[must_use]
    pub fn builtins(&self) -> &BuiltinModules {
        &self.builtins
    }

    /// Publish the bus to `slot` and mount every enabled module.
    ///
    /// Returns the monitor poller handle when the monitor is mounted.
    pub async fn start(&self, slot: &BusSlot) -> Result<Option<JoinHandle<()>>, ModuleError> {
        info!("===========================================");
        info!("  Micro-Frontend Host v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        slot.publish(Arc::clone(&self.bus))?;

        for failure in self.registry.mount_all(slot).await? {
            warn!("Module unavailable: {}", failure);
        }
        info!(mounted = ?self.registry.mounted_ids(), "Modules mounted");

        if self.registry.status(modules::MONITOR_MODULE_ID) == ModuleStatus::Mounted {
            let handle = self
                .builtins
                .monitor
                .spawn_poller(self.config.monitor.poll_interval, self.shutdown_rx.clone());
            return Ok(Some(handle));
        }
        Ok(None)
    }

    /// Current bus statistics.
    #[must_use]
    pub fn statistics(&self) -> BusStatistics {
        BusStatistics::collect(&self.bus)
    }

    /// Signal background tasks to stop and unmount every module.
    pub async fn shutdown(&self) {
        info!("Shutting down host runtime");
        let _ = self.shutdown_tx.send(true);
        for error in self.registry.unmount_all().await {
            warn!("Unmount error: {}", error);
        }
    }
}
