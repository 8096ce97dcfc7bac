//! Subscription manager: re-reads affected snapshots and delivers changes.

use crate::reader::read;
use crate::records::RecordSource;
use crate::types::{DataId, Snapshot};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId};

/// Internal subscription state.
struct Subscription {
    snapshot: Snapshot,
    sender: Sender<StoreEvent>,
}

impl Subscription {
    /// Try to send an event, reporting why it could not be delivered.
    fn try_send(&self, event: StoreEvent) -> Option<DropReason> {
        match self.sender.try_send(event) {
            Ok(()) => None,
            Err(TrySendError::Full(_)) => Some(DropReason::BufferOverflow),
            Err(TrySendError::Disconnected(_)) => Some(DropReason::Disconnected),
        }
    }

    fn is_affected_by(&self, updated: &HashSet<DataId>) -> bool {
        !self.snapshot.seen_records.is_disjoint(updated)
    }
}

/// Manages subscriptions and delivers updated snapshots.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Watch `snapshot`; later changes to its data arrive on the handle.
    pub fn subscribe(&self, snapshot: Snapshot, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size);

        self.subscriptions
            .write()
            .insert(id, Subscription { snapshot, sender });

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Best effort; the receiver may already be gone.
            let _ = sub.sender.try_send(StoreEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// The snapshot a subscription currently holds.
    pub fn snapshot(&self, id: SubscriptionId) -> Option<Snapshot> {
        self.subscriptions.read().get(&id).map(|sub| sub.snapshot.clone())
    }

    /// Re-read every subscription that saw one of `updated` and deliver the
    /// ones whose data changed. Returns the number of snapshots delivered.
    pub fn notify(&self, source: &dyn RecordSource, updated: &HashSet<DataId>) -> usize {
        let mut delivered = 0;
        let mut to_remove = Vec::new();

        {
            let mut subs = self.subscriptions.write();
            for (id, sub) in subs.iter_mut() {
                if !sub.is_affected_by(updated) {
                    continue;
                }

                let next = match read(source, &sub.snapshot.selector) {
                    Ok(next) => next,
                    Err(e) => {
                        tracing::warn!(subscription = id.0, error = %e, "failed to re-read snapshot");
                        to_remove.push((*id, DropReason::Error(e.to_string())));
                        continue;
                    }
                };

                let changed = next.data != sub.snapshot.data;
                sub.snapshot = next;
                if !changed {
                    continue;
                }

                match sub.try_send(StoreEvent::Snapshot {
                    snapshot: sub.snapshot.clone(),
                }) {
                    None => delivered += 1,
                    Some(reason) => to_remove.push((*id, reason)),
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for (id, reason) in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    tracing::debug!(subscription = id.0, ?reason, "dropping subscription");
                    // Try to notify about the drop (might fail, that's ok)
                    let _ = sub.sender.try_send(StoreEvent::Dropped { reason });
                }
            }
        }

        delivered
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
