//! # Shop Module
//!
//! Follows the host theme and reports purchases.
//!
//! - Subscribes: `themeChanged` (payload: theme name string)
//! - Emits: `userAction` (payload: `{"action": ..., "productId": ...}`)

use async_trait::async_trait;
use mf_event_bus::{Callback, ModuleClient, SubscriptionGuard};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::{THEME_CHANGED, USER_ACTION};
use crate::registry::{ModuleError, RemoteModule};

/// Module id of the shop.
pub const SHOP_MODULE_ID: &str = "shop-mf";

/// The shop front-end module.
#[derive(Default)]
pub struct ShopModule {
    client: Mutex<Option<ModuleClient>>,
    guards: Mutex<Vec<SubscriptionGuard>>,
    theme: Arc<Mutex<Option<String>>>,
}

impl ShopModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Theme last received from the host, if any.
    #[must_use]
    pub fn theme(&self) -> Option<String> {
        self.theme.lock().clone()
    }

    /// Report a click on the buy button.
    pub fn buy(&self, product_id: u64) -> Result<(), ModuleError> {
        let client = self.client.lock().clone().ok_or_else(|| ModuleError::NotMounted {
            module: SHOP_MODULE_ID.to_string(),
        })?;
        client.emit(
            USER_ACTION,
            json!({ "action": "clickedBuyButton", "productId": product_id }),
        )?;
        Ok(())
    }
}

#[async_trait]
impl RemoteModule for ShopModule {
    fn id(&self) -> &str {
        SHOP_MODULE_ID
    }

    async fn mount(&self, client: ModuleClient) -> Result<(), ModuleError> {
        let theme = Arc::clone(&self.theme);
        let on_theme = Callback::new(move |payload| {
            let Some(name) = payload.as_str() else {
                anyhow::bail!("themeChanged payload must be a string, got {payload}");
            };
            info!(module = SHOP_MODULE_ID, theme = %name, "Theme applied");
            *theme.lock() = Some(name.to_string());
            Ok(())
        });

        if let Some(current) = client.current_state(THEME_CHANGED) {
            if let Some(name) = current.as_str() {
                *self.theme.lock() = Some(name.to_string());
            }
        }

        let guard = client.subscribe(THEME_CHANGED, on_theme)?;
        self.guards.lock().push(guard);
        *self.client.lock() = Some(client);
        Ok(())
    }

    async fn unmount(&self) -> Result<(), ModuleError> {
        self.guards.lock().clear();
        *self.client.lock() = None;
        Ok(())
    }
}
