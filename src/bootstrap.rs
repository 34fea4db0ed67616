//! Initial parallel fetch of tickets and users

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::api::{ApiError, TicketApi};
use crate::store::{EntityCache, Store};

pub const LOAD_FAILURE_MESSAGE: &str = "Failed to load data";

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum BootstrapError {
    #[error("failed to load tickets: {0}")]
    Tickets(ApiError),
    #[error("failed to load users: {0}")]
    Users(ApiError),
    #[error("failed to load tickets ({tickets}) and users ({users})")]
    Both { tickets: ApiError, users: ApiError },
}

#[derive(Clone)]
pub struct BootstrapLoader {
    api: Arc<dyn TicketApi>,
    store: Store,
}

impl BootstrapLoader {
    pub fn new(api: Arc<dyn TicketApi>, store: Store) -> Self {
        Self { api, store }
    }

    /// Fetches tickets and users concurrently and installs both into the
    /// cache only when both succeed. Any failure leaves the cache as it was
    /// and moves the store to [`LoadState::Failed`].
    pub async fn load(&self) -> Result<(), BootstrapError> {
        self.store.set_load_state(LoadState::Loading);

        let (tickets, users) = tokio::join!(self.api.list_tickets(), self.api.list_users());

        let outcome = match (tickets, users) {
            (Ok(tickets), Ok(users)) => Ok((tickets, users)),
            (Err(tickets), Ok(_)) => Err(BootstrapError::Tickets(tickets)),
            (Ok(_), Err(users)) => Err(BootstrapError::Users(users)),
            (Err(tickets), Err(users)) => Err(BootstrapError::Both { tickets, users }),
        };

        match outcome {
            Ok((tickets, users)) => {
                info!(
                    ticket_count = tickets.len(),
                    user_count = users.len(),
                    "bootstrap complete"
                );
                self.store
                    .replace_cache(EntityCache::from_snapshot(tickets, users));
                self.store.set_load_state(LoadState::Ready);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "bootstrap failed");
                self.store
                    .set_load_state(LoadState::Failed(LOAD_FAILURE_MESSAGE.to_string()));
                Err(err)
            }
        }
    }
}
