//! Subscription system for snapshot updates.
//!
//! A subscription holds the last snapshot delivered for a selector. When the
//! store notifies, only subscriptions whose seen records intersect the
//! changed IDs are re-read, and only those whose data actually differs
//! receive an event.
//!
//! Subscriptions use bounded buffers; slow or disconnected subscribers are
//! dropped.
//!
//! # Example
//!
//! ```ignore
//! let snapshot = store.lookup(&selector)?;
//! let handle = store.subscribe(snapshot);
//!
//! queue.run()?;
//! while let Ok(event) = handle.try_recv() {
//!     match event {
//!         StoreEvent::Snapshot { snapshot } => render(snapshot.data),
//!         StoreEvent::Dropped { .. } => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId};
