//! Publish queue: sequences server payloads and optimistic updates.
//!
//! Optimistic updaters are applied on top of the canonical store with a
//! backup capturing every record they touch. Whenever server data arrives or
//! an applied updater is reverted, the next [`run`](PublishQueue::run)
//! restores the backup, commits the server data, then replays the surviving
//! updaters in their original order. Subscribers are notified once per run,
//! after all of that, so they never observe a half-rebased store.

use crate::error::{Result, StoreError};
use crate::handlers::HandlerProvider;
use crate::mutator::RecordSourceMutator;
use crate::proxy::{RecordSourceProxy, RecordSourceSelectorProxy};
use crate::records::{Backup, InMemoryRecordSource};
use crate::store::Store;
use crate::types::{ResponsePayload, Selector, UpdateId};
use indexmap::IndexMap;
use std::sync::Arc;

/// Optimistic or local updater. Replayed on every rebase, so it must be
/// repeatable.
pub type StoreUpdater = Box<dyn Fn(&RecordSourceProxy<'_>) -> Result<()>>;

/// Updater run once against a committed payload.
pub type SelectorStoreUpdater = Box<dyn FnOnce(&RecordSourceSelectorProxy<'_>) -> Result<()>>;

/// Authoritative work waiting for the next run, in commit order.
enum PendingCommit {
    Payload {
        selector: Selector,
        payload: ResponsePayload,
        updater: Option<SelectorStoreUpdater>,
    },
    Updater(StoreUpdater),
}

pub struct PublishQueue {
    store: Arc<Store>,
    handler_provider: Box<dyn HandlerProvider>,
    /// Pre-optimistic values of every record the applied updaters touched.
    backup: Backup,
    pending_commits: Vec<PendingCommit>,
    pending_updaters: IndexMap<UpdateId, StoreUpdater>,
    /// Insertion order is application order.
    applied_updaters: IndexMap<UpdateId, StoreUpdater>,
    pending_backup_rebase: bool,
}

impl PublishQueue {
    pub fn new(store: Arc<Store>, handler_provider: impl HandlerProvider + 'static) -> Self {
        Self {
            store,
            handler_provider: Box::new(handler_provider),
            backup: Backup::new(),
            pending_commits: Vec::new(),
            pending_updaters: IndexMap::new(),
            applied_updaters: IndexMap::new(),
            pending_backup_rebase: false,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Schedule an optimistic updater for the next run.
    ///
    /// Fails if `id` is already pending or applied.
    pub fn apply_update<F>(&mut self, id: UpdateId, updater: F) -> Result<()>
    where
        F: Fn(&RecordSourceProxy<'_>) -> Result<()> + 'static,
    {
        if self.pending_updaters.contains_key(&id) || self.applied_updaters.contains_key(&id) {
            return Err(StoreError::UpdateAlreadyApplied(id));
        }
        self.pending_updaters.insert(id, Box::new(updater));
        Ok(())
    }

    /// Undo an optimistic updater.
    ///
    /// A pending updater is simply dropped. An applied one is removed and the
    /// next run rebases the remaining updaters without it. Returns whether
    /// `id` was known.
    pub fn revert_update(&mut self, id: UpdateId) -> bool {
        if self.pending_updaters.shift_remove(&id).is_some() {
            return true;
        }
        if self.applied_updaters.shift_remove(&id).is_some() {
            self.pending_backup_rebase = true;
            return true;
        }
        false
    }

    /// Undo every optimistic updater.
    pub fn revert_all(&mut self) {
        self.pending_updaters.clear();
        self.applied_updaters.clear();
        self.pending_backup_rebase = true;
    }

    /// Schedule authoritative server data for the next run.
    pub fn commit_payload(&mut self, selector: Selector, payload: ResponsePayload) {
        self.enqueue(PendingCommit::Payload {
            selector,
            payload,
            updater: None,
        });
    }

    /// Like [`commit_payload`](Self::commit_payload), also running `updater`
    /// against the payload's transaction before it is published.
    pub fn commit_payload_with_updater<F>(
        &mut self,
        selector: Selector,
        payload: ResponsePayload,
        updater: F,
    ) where
        F: FnOnce(&RecordSourceSelectorProxy<'_>) -> Result<()> + 'static,
    {
        self.enqueue(PendingCommit::Payload {
            selector,
            payload,
            updater: Some(Box::new(updater)),
        });
    }

    /// Schedule a local change that is authoritative: it is published like
    /// server data and never reverted.
    pub fn commit_update<F>(&mut self, updater: F)
    where
        F: Fn(&RecordSourceProxy<'_>) -> Result<()> + 'static,
    {
        self.enqueue(PendingCommit::Updater(Box::new(updater)));
    }

    pub fn pending_update_count(&self) -> usize {
        self.pending_updaters.len()
    }

    pub fn applied_update_count(&self) -> usize {
        self.applied_updaters.len()
    }

    pub fn pending_commit_count(&self) -> usize {
        self.pending_commits.len()
    }

    pub fn has_pending_rebase(&self) -> bool {
        self.pending_backup_rebase
    }

    /// Apply everything scheduled since the last run, then notify once.
    ///
    /// An error from a handler or updater aborts the run where it happened:
    /// publishes that already completed stay in the store, the rebase flag
    /// stays set, and subscribers are not notified until the next run.
    pub fn run(&mut self) -> Result<()> {
        tracing::debug!(
            commits = self.pending_commits.len(),
            pending_updates = self.pending_updaters.len(),
            applied_updates = self.applied_updaters.len(),
            rebase = self.pending_backup_rebase,
            "running publish queue"
        );

        self.restore_backup();
        self.commit_pending()?;
        self.apply_updates()?;
        self.pending_backup_rebase = false;
        self.store.notify();
        Ok(())
    }

    fn enqueue(&mut self, commit: PendingCommit) {
        self.pending_commits.push(commit);
        self.pending_backup_rebase = true;
    }

    fn restore_backup(&mut self) {
        if self.pending_backup_rebase && !self.backup.is_empty() {
            self.store.restore(&self.backup);
            self.backup.clear();
        }
    }

    fn commit_pending(&mut self) -> Result<()> {
        let commits = std::mem::take(&mut self.pending_commits);
        for commit in commits {
            match commit {
                PendingCommit::Payload {
                    selector,
                    payload,
                    updater,
                } => {
                    let ResponsePayload {
                        mut source,
                        field_payloads,
                    } = payload;
                    {
                        let base = self.store.source();
                        let proxy = RecordSourceProxy::new(RecordSourceMutator::new(
                            &*base,
                            &mut source,
                            None,
                        ));
                        for field_payload in &field_payloads {
                            let handler = self
                                .handler_provider
                                .get(&field_payload.handle)
                                .ok_or_else(|| {
                                    StoreError::MissingHandler(field_payload.handle.clone())
                                })?;
                            handler.update(&proxy, field_payload)?;
                        }
                        if let Some(updater) = updater {
                            updater(&RecordSourceSelectorProxy::new(proxy, selector))?;
                        }
                    }
                    self.store.publish(&source);
                }
                PendingCommit::Updater(updater) => {
                    let mut sink = InMemoryRecordSource::new();
                    {
                        let base = self.store.source();
                        let proxy =
                            RecordSourceProxy::new(RecordSourceMutator::new(&*base, &mut sink, None));
                        updater(&proxy)?;
                    }
                    self.store.publish(&sink);
                }
            }
        }
        Ok(())
    }

    fn apply_updates(&mut self) -> Result<()> {
        let rebase = self.pending_backup_rebase && !self.applied_updaters.is_empty();
        if self.pending_updaters.is_empty() && !rebase {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.pending_updaters);
        let mut applied = Vec::with_capacity(pending.len());
        let mut sink = InMemoryRecordSource::new();
        {
            let base = self.store.source();
            let proxy = RecordSourceProxy::new(RecordSourceMutator::new(
                &*base,
                &mut sink,
                Some(&mut self.backup),
            ));
            if rebase {
                for (id, updater) in &self.applied_updaters {
                    tracing::trace!(update = id.0, "replaying optimistic update");
                    updater(&proxy)?;
                }
            }
            for (id, updater) in pending {
                tracing::trace!(update = id.0, "applying optimistic update");
                updater(&proxy)?;
                applied.push((id, updater));
            }
        }
        self.store.publish(&sink);
        // Only updaters whose writes reached the store count as applied.
        self.applied_updaters.extend(applied);
        Ok(())
    }
}
