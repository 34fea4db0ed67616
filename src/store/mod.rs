//! Shared session state injected into every view.
//!
//! `Store` is the only writable home of the entity cache, the operation
//! tracker and the bootstrap load state. Views read snapshots through it and
//! subscribe to its revision channel to know when to re-derive; writes are
//! `pub(crate)` so they can only come from the executor and the loader.

pub mod cache;
pub mod tracker;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::debug;

use crate::bootstrap::LoadState;
use crate::types::{Ticket, TicketId, User};

pub use cache::EntityCache;
pub use tracker::{OperationStatus, OperationTracker};

#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    cache: Mutex<EntityCache>,
    tracker: Mutex<OperationTracker>,
    load_state: Mutex<LoadState>,
    revision: watch::Sender<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                cache: Mutex::new(EntityCache::default()),
                tracker: Mutex::new(OperationTracker::default()),
                load_state: Mutex::new(LoadState::Loading),
                revision,
            }),
        }
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        lock(&self.inner.cache).tickets()
    }

    pub fn users(&self) -> Vec<User> {
        lock(&self.inner.cache).users()
    }

    pub fn ticket(&self, id: TicketId) -> Option<Ticket> {
        lock(&self.inner.cache).ticket(id)
    }

    /// Copy of the whole cache, for comparisons and exports.
    pub fn cache_snapshot(&self) -> EntityCache {
        lock(&self.inner.cache).clone()
    }

    pub fn status(&self, id: TicketId) -> OperationStatus {
        lock(&self.inner.tracker).status(id)
    }

    pub fn statuses(&self) -> HashMap<TicketId, OperationStatus> {
        lock(&self.inner.tracker).snapshot()
    }

    pub fn load_state(&self) -> LoadState {
        lock(&self.inner.load_state).clone()
    }

    /// Receiver that observes a new revision after every cache, tracker or
    /// load-state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub(crate) fn update_cache<R>(&self, update: impl FnOnce(&mut EntityCache) -> R) -> R {
        let result = {
            let mut cache = lock(&self.inner.cache);
            update(&mut cache)
        };
        self.bump();
        result
    }

    pub(crate) fn replace_cache(&self, cache: EntityCache) {
        *lock(&self.inner.cache) = cache;
        self.bump();
    }

    pub(crate) fn set_load_state(&self, state: LoadState) {
        *lock(&self.inner.load_state) = state;
        self.bump();
    }

    pub(crate) fn begin_operation(
        &self,
        id: TicketId,
        status: OperationStatus,
    ) -> Result<OperationGuard, OperationStatus> {
        lock(&self.inner.tracker).try_begin(id, status)?;
        debug!(ticket_id = %id, status = status.as_str(), "operation started");
        self.bump();
        Ok(OperationGuard {
            store: self.clone(),
            id,
        })
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|revision| *revision += 1);
    }
}

/// Holds a ticket in its non-idle status; dropping it returns the ticket to
/// idle on every exit path.
#[derive(Debug)]
pub struct OperationGuard {
    store: Store,
    id: TicketId,
}

impl OperationGuard {
    pub fn ticket_id(&self) -> TicketId {
        self.id
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        let previous = lock(&self.store.inner.tracker).finish(self.id);
        debug!(ticket_id = %self.id, status = previous.as_str(), "operation released");
        self.store.bump();
    }
}
