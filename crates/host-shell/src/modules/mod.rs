//! # Built-in Modules
//!
//! Modules shipped with the host. Each one only knows the event names below;
//! none of them references another module.
//!
//! | Event | Payload | Emitted by | Consumed by |
//! |-------|---------|------------|-------------|
//! | `themeChanged` | theme name string | host | shop |
//! | `userUpdated` | user object | host, monitor | dashboard |
//! | `userAction` | `{"action", "productId"}` | shop | dashboard |

pub mod dashboard;
pub mod monitor;
pub mod shop;

pub use dashboard::{DashboardModule, DASHBOARD_MODULE_ID};
pub use monitor::{MonitorModule, MonitorSample, MONITOR_MODULE_ID};
pub use shop::{ShopModule, SHOP_MODULE_ID};

/// Host theme switched.
pub const THEME_CHANGED: &str = "themeChanged";

/// Current user record replaced.
pub const USER_UPDATED: &str = "userUpdated";

/// A user interacted with a module.
pub const USER_ACTION: &str = "userAction";

/// Ids of every built-in module, in mount order.
pub const BUILTIN_MODULE_IDS: [&str; 3] = [SHOP_MODULE_ID, DASHBOARD_MODULE_ID, MONITOR_MODULE_ID];
