//! One browsing session: the shared store plus the components that write it.

use std::sync::Arc;

use tracing::info;

use crate::api::{ApiConfig, ApiError, HttpTicketApi, TicketApi};
use crate::bootstrap::{BootstrapError, BootstrapLoader};
use crate::executor::{Action, ActionOutcome, MutationExecutor, PendingMutation};
use crate::settings::Settings;
use crate::store::Store;
use crate::types::FilterMode;
use crate::views::{DetailView, ListView};

#[derive(Clone)]
pub struct Session {
    store: Store,
    executor: MutationExecutor,
    loader: BootstrapLoader,
}

impl Session {
    pub fn new(api: Arc<dyn TicketApi>) -> Self {
        let store = Store::new();
        Self {
            executor: MutationExecutor::new(Arc::clone(&api), store.clone()),
            loader: BootstrapLoader::new(api, store.clone()),
            store,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        let api = HttpTicketApi::new(ApiConfig::from_settings(settings))?;
        info!(base_url = %api.config().base_url, "ticket api configured");
        Ok(Self::new(Arc::new(api)))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn executor(&self) -> &MutationExecutor {
        &self.executor
    }

    pub async fn load(&self) -> Result<(), BootstrapError> {
        self.loader.load().await
    }

    /// User-initiated retry: restarts both bootstrap fetches from scratch.
    pub async fn reload(&self) -> Result<(), BootstrapError> {
        info!("reloading session data");
        self.loader.load().await
    }

    pub fn dispatch(&self, action: Action) -> PendingMutation<ActionOutcome> {
        self.executor.spawn(action)
    }

    pub fn list_view(&self, filter: FilterMode) -> ListView {
        ListView::new(self.clone(), filter)
    }

    pub fn detail_view(&self, raw_id: impl Into<String>) -> DetailView {
        DetailView::new(self.clone(), raw_id)
    }
}
