//! # WebCrafter Studio
//!
//! Runtime around the playground core: configuration, the OpenRouter
//! gateway, notifications, project directories and the interactive session
//! loop driven by the `webcrafter-studio` binary.

pub mod config;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod project;
pub mod session;

pub use config::{api_key_from_env, GatewayConfig, StudioConfig};
pub use error::{StudioError, StudioResult};
pub use gateway::{Gateway, OpenRouterGateway};
pub use notify::{Level, Notification, Notifier};
pub use session::{Command, Reply, Session, Slot};

use std::sync::Arc;
use webcrafter_core::{
    global_loader, CodeBundle, FileStore, HeadlessModule, Playground, WidgetModule,
};

/// Opens a playground over the configured file store, with the process-wide
/// editor widget. When the widget cannot be loaded the editor stays inert.
pub async fn open_playground(config: &StudioConfig, initial: CodeBundle) -> Playground<FileStore> {
    let module = global_loader()
        .load(|| async { Ok(Arc::new(HeadlessModule) as Arc<dyn WidgetModule>) })
        .await;
    let store = FileStore::open(config.store_path.clone());
    Playground::open(store, module.as_deref(), initial, &config.playground_settings())
}

/// The OpenRouter gateway when an API key is configured.
pub fn gateway_from_env(config: &StudioConfig) -> StudioResult<Option<Arc<dyn Gateway>>> {
    let Some(key) = api_key_from_env() else {
        tracing::warn!("{} is not set; generation is disabled", config::API_KEY_VAR);
        return Ok(None);
    };
    let gateway = OpenRouterGateway::new(config.gateway.clone(), key)?;
    Ok(Some(Arc::new(gateway)))
}

// ─── Tests ───────────────────────────────────────────────────────────
