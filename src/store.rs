//! Main Store struct owning the canonical record source.

use crate::error::Result;
use crate::reader::read;
use crate::records::{Backup, InMemoryRecordSource, MutableRecordSource, RecordSource};
use crate::subscriptions::{
    SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::types::{DataId, RecordStatus, Selector, Snapshot, StoreStats};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Buffer size for subscriptions created through [`Store::subscribe`].
    pub subscription_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            subscription_buffer_size: 1000,
        }
    }
}

/// Selectors retained against collection, keyed by handle.
#[derive(Default)]
struct RootTable {
    roots: HashMap<u64, Selector>,
    next_id: u64,
}

/// Keeps a selector's records retained until disposed or dropped.
pub struct RetainHandle {
    id: u64,
    roots: Arc<Mutex<RootTable>>,
}

impl RetainHandle {
    /// Release the retain. Equivalent to dropping the handle.
    pub fn dispose(self) {}
}

impl Drop for RetainHandle {
    fn drop(&mut self) {
        self.roots.lock().roots.remove(&self.id);
    }
}

/// The canonical normalized cache.
///
/// `publish` merges into the canonical source without telling anyone;
/// `notify` is the single point where subscribers observe change. Splitting
/// the two lets a caller apply several publishes and deliver them as one.
pub struct Store {
    /// Store configuration.
    config: StoreConfig,

    /// Canonical records.
    source: RwLock<InMemoryRecordSource>,

    /// IDs changed by publishes since the last notify.
    updated_record_ids: Mutex<HashSet<DataId>>,

    /// Subscription manager.
    subscriptions: SubscriptionManager,

    /// Retained selectors.
    roots: Arc<Mutex<RootTable>>,
}

impl Store {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_source(InMemoryRecordSource::new(), config)
    }

    /// Create a store seeded with `source`.
    pub fn with_source(source: InMemoryRecordSource, config: StoreConfig) -> Self {
        Self {
            config,
            source: RwLock::new(source),
            updated_record_ids: Mutex::new(HashSet::new()),
            subscriptions: SubscriptionManager::new(),
            roots: Arc::new(Mutex::new(RootTable::default())),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Read access to the canonical source.
    pub fn source(&self) -> RwLockReadGuard<'_, InMemoryRecordSource> {
        self.source.read()
    }

    // --- Reads ---

    pub fn lookup(&self, selector: &Selector) -> Result<Snapshot> {
        let source = self.source.read();
        read(&*source, selector)
    }

    pub fn subscribe(&self, snapshot: Snapshot) -> SubscriptionHandle {
        self.subscribe_with_config(
            snapshot,
            SubscriptionConfig {
                buffer_size: self.config.subscription_buffer_size,
            },
        )
    }

    pub fn subscribe_with_config(
        &self,
        snapshot: Snapshot,
        config: SubscriptionConfig,
    ) -> SubscriptionHandle {
        self.subscriptions.subscribe(snapshot, config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id)
    }

    // --- Writes ---

    /// Merge `source` into the canonical source. No subscriber is told.
    ///
    /// Returns the number of records that changed.
    pub fn publish(&self, source: &dyn RecordSource) -> usize {
        let mut target = self.source.write();
        let mut updated = self.updated_record_ids.lock();
        let mut changed = 0;

        for id in source.record_ids() {
            let touched = match source.status(&id) {
                RecordStatus::Existent => match source.get(&id) {
                    Some(next) => {
                        let merged = match target.get(&id) {
                            Some(prev) => prev.update(next),
                            None => Some(next.clone()),
                        };
                        match merged {
                            Some(record) => {
                                target.set(id.clone(), record);
                                true
                            }
                            None => false,
                        }
                    }
                    None => false,
                },
                RecordStatus::Nonexistent => {
                    if target.status(&id) == RecordStatus::Nonexistent {
                        false
                    } else {
                        target.delete(&id);
                        true
                    }
                }
                RecordStatus::Unknown => false,
            };
            if touched {
                updated.insert(id);
                changed += 1;
            }
        }

        tracing::debug!(records = source.size(), changed, "published source");
        changed
    }

    /// Put every record captured in `backup` back to its prior state.
    ///
    /// Unlike [`publish`](Self::publish) this replaces records outright, so
    /// fields added since the capture disappear. No subscriber is told.
    pub fn restore(&self, backup: &Backup) -> usize {
        let mut target = self.source.write();
        let changed = backup.restore_into(&mut *target);
        let count = changed.len();
        self.updated_record_ids.lock().extend(changed);

        tracing::debug!(records = backup.len(), changed = count, "restored backup");
        count
    }

    /// Deliver every change published since the last notify.
    ///
    /// Returns the number of snapshots delivered.
    pub fn notify(&self) -> usize {
        let updated = std::mem::take(&mut *self.updated_record_ids.lock());
        if updated.is_empty() {
            tracing::trace!("notify with no updated records");
            return 0;
        }

        let source = self.source.read();
        let delivered = self.subscriptions.notify(&*source, &updated);
        tracing::debug!(updated = updated.len(), delivered, "notified subscribers");
        delivered
    }

    /// IDs published since the last notify.
    pub fn updated_record_ids(&self) -> HashSet<DataId> {
        self.updated_record_ids.lock().clone()
    }

    // --- Retention ---

    /// Protect `selector`'s records from collection until the handle goes away.
    pub fn retain(&self, selector: Selector) -> RetainHandle {
        let mut table = self.roots.lock();
        table.next_id += 1;
        let id = table.next_id;
        table.roots.insert(id, selector);
        RetainHandle {
            id,
            roots: Arc::clone(&self.roots),
        }
    }

    /// Number of live retains on `selector`.
    pub fn retain_count(&self, selector: &Selector) -> usize {
        self.roots
            .lock()
            .roots
            .values()
            .filter(|retained| *retained == selector)
            .count()
    }

    /// Every selector with at least one live retain.
    pub fn retained_selectors(&self) -> Vec<Selector> {
        let table = self.roots.lock();
        let mut selectors: Vec<Selector> = Vec::new();
        for selector in table.roots.values() {
            if !selectors.contains(selector) {
                selectors.push(selector.clone());
            }
        }
        selectors
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            record_count: self.source.read().size(),
            subscription_count: self.subscriptions.subscription_count(),
            retained_count: self.roots.lock().roots.len(),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
