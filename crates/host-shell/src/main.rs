//! # Micro-Frontend Host
//!
//! Entry point for the host shell. Builds the event bus once, publishes it to
//! the process-wide slot and mounts the shop, dashboard and monitor modules.
//!
//! ## Session
//!
//! Without arguments the host plays a short scripted session (theme change,
//! user login, a purchase and a manual monitor event), prints the bus
//! statistics and exits. With `--serve` it keeps running until Ctrl+C.
//!
//! ## Environment
//!
//! - `MF_BUS_MAX_HISTORY`, `MF_BUS_ENABLE_LOGGING`, `MF_BUS_ENABLE_MONITOR`,
//!   `MF_BUS_LOG_LEVEL`: bus configuration
//! - `MF_LOG_LEVEL` / `RUST_LOG`, `MF_JSON_LOGS`: log output
//! - `MF_MODULE_<ID>`: per-module switch, e.g. `MF_MODULE_SHOP_MF=false`

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{error, info, warn};

use host_shell::modules::{MONITOR_MODULE_ID, THEME_CHANGED, USER_UPDATED};
use host_shell::{HostConfig, HostRuntime, ModuleStatus};

/// Module id used for events emitted by the host itself.
const HOST_ID: &str = "host";

/// Drive the mounted modules through a short user session.
fn run_session(runtime: &HostRuntime) -> Result<()> {
    let bus = runtime.bus();

    bus.emit(THEME_CHANGED, json!("dark"), Some(HOST_ID))?;
    bus.emit(
        USER_UPDATED,
        json!({ "name": "Ada", "role": "admin" }),
        Some(HOST_ID),
    )?;

    if let Err(e) = runtime.builtins().shop.buy(42) {
        warn!("Shop unavailable: {}", e);
    }

    if runtime.registry().status(MONITOR_MODULE_ID) == ModuleStatus::Mounted {
        runtime
            .builtins()
            .monitor
            .send_manual_event("cacheInvalidated", r#"{"scope":"products"}"#)?;
    }

    // A malformed theme is contained by the bus and shows up as a fault.
    let report = bus.emit_with_report(THEME_CHANGED, json!(7), Some(HOST_ID))?;
    if !report.is_clean() {
        warn!(
            event = %report.event,
            faults = report.fault_count(),
            "Subscriber faults during session"
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = HostConfig::from_env().context("Invalid host configuration")?;
    let _telemetry =
        mf_telemetry::init_telemetry(&config.telemetry).context("Failed to initialize logging")?;

    let serve = std::env::args().skip(1).any(|arg| arg == "--serve");

    let runtime = HostRuntime::new(config)?;
    let poller = runtime.start(mf_event_bus::global_slot()).await?;

    if serve {
        info!("Host is running. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await?;
    } else {
        run_session(&runtime)?;
    }

    let stats = runtime.statistics();
    println!("Event bus statistics");
    println!("  log entries      : {}", stats.total_entries);
    println!("  emits            : {}", stats.emits);
    println!("  handled          : {}", stats.handled);
    println!("  subscribes       : {}", stats.subscribes);
    println!("  unsubscribes     : {}", stats.unsubscribes);
    println!("  evicted          : {}", stats.evicted_entries);
    println!("  active modules   : {}", stats.active_modules);
    println!("  tracked events   : {}", stats.tracked_events);
    println!("  events published : {}", stats.events_published);

    runtime.shutdown().await;
    if let Some(handle) = poller {
        if let Err(e) = handle.await {
            error!("Monitor poller ended abnormally: {}", e);
        }
    }

    Ok(())
}
