//! Application state shared across all request handlers.

use hookline_core::config::{ConfigStore, Settings};
use hookline_core::processors::EventRouter;
use hookline_core::store::RegistrationStore;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Registration storage.
    pub store: Arc<dyn RegistrationStore>,
    /// Webhook settings (can be reloaded via SIGHUP).
    pub config: ConfigStore<Settings>,
    /// Routes ingested lifecycle events.
    pub router: Arc<EventRouter>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        config: ConfigStore<Settings>,
        router: EventRouter,
    ) -> Self {
        Self {
            store,
            config,
            router: Arc::new(router),
        }
    }

    /// Current webhook settings.
    pub async fn settings(&self) -> Arc<Settings> {
        self.config.load().await
    }
}
