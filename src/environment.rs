//! Environment: one store plus the queue that writes to it.
//!
//! Every write method schedules its work and runs the queue immediately, so
//! callers see a single notify per call.

use crate::error::Result;
use crate::handlers::{HandlerProvider, HandlerRegistry};
use crate::proxy::{RecordSourceProxy, RecordSourceSelectorProxy};
use crate::publish_queue::PublishQueue;
use crate::store::{RetainHandle, Store};
use crate::subscriptions::SubscriptionHandle;
use crate::types::{ResponsePayload, Selector, Snapshot, UpdateId};
use std::sync::Arc;

pub struct Environment {
    store: Arc<Store>,
    queue: PublishQueue,
}

impl Environment {
    pub fn new(store: Arc<Store>, handler_provider: impl HandlerProvider + 'static) -> Self {
        let queue = PublishQueue::new(Arc::clone(&store), handler_provider);
        Self { store, queue }
    }

    /// Environment over a fresh default store with the built-in handlers.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(Store::default()), HandlerRegistry::with_defaults())
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn lookup(&self, selector: &Selector) -> Result<Snapshot> {
        self.store.lookup(selector)
    }

    pub fn subscribe(&self, snapshot: Snapshot) -> SubscriptionHandle {
        self.store.subscribe(snapshot)
    }

    pub fn retain(&self, selector: Selector) -> RetainHandle {
        self.store.retain(selector)
    }

    /// Apply an optimistic updater and return the token that reverts it.
    pub fn apply_update<F>(&mut self, updater: F) -> Result<UpdateId>
    where
        F: Fn(&RecordSourceProxy<'_>) -> Result<()> + 'static,
    {
        let id = UpdateId::next();
        self.queue.apply_update(id, updater)?;
        self.queue.run()?;
        Ok(id)
    }

    /// Revert an optimistic updater. Unknown tokens are ignored.
    pub fn revert_update(&mut self, id: UpdateId) -> Result<()> {
        if self.queue.revert_update(id) {
            self.queue.run()?;
        } else {
            tracing::debug!(update = id.0, "revert of unknown update ignored");
        }
        Ok(())
    }

    pub fn commit_payload(&mut self, selector: Selector, payload: ResponsePayload) -> Result<()> {
        self.queue.commit_payload(selector, payload);
        self.queue.run()
    }

    pub fn commit_payload_with_updater<F>(
        &mut self,
        selector: Selector,
        payload: ResponsePayload,
        updater: F,
    ) -> Result<()>
    where
        F: FnOnce(&RecordSourceSelectorProxy<'_>) -> Result<()> + 'static,
    {
        self.queue
            .commit_payload_with_updater(selector, payload, updater);
        self.queue.run()
    }

    /// Write a local change directly. It is never reverted.
    pub fn commit_update<F>(&mut self, updater: F) -> Result<()>
    where
        F: Fn(&RecordSourceProxy<'_>) -> Result<()> + 'static,
    {
        self.queue.commit_update(updater);
        self.queue.run()
    }
}
