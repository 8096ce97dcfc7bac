//! # Graph Store
//!
//! A normalized client-side graph cache with optimistic updates.
//!
//! ## Core Concepts
//!
//! - **Records**: Flat maps of fields keyed by ID, linking to each other by ID
//! - **Mutator**: Copy-on-write overlay that writes into a sink and keeps a backup
//! - **Proxies**: The ergonomic surface updaters use to read and write records
//! - **Publish queue**: Rebases optimistic updates over authoritative data
//!
//! ## Example
//!
//! ```ignore
//! use graph_store::{Environment, ReaderNode, Selection, Selector};
//! use std::sync::Arc;
//!
//! let mut env = Environment::with_defaults();
//! let selector = Selector::new("4", Arc::new(ReaderNode::new(
//!     "UserQuery",
//!     vec![Selection::scalar("name")],
//! )), Default::default());
//!
//! // Show a name optimistically
//! let id = env.apply_update(|store| {
//!     store.create("4", "User")?.set_value("Zuck".into(), "name", None)?;
//!     Ok(())
//! })?;
//!
//! // The server rejected it
//! env.revert_update(id)?;
//! ```

pub mod environment;
pub mod error;
pub mod handlers;
pub mod mutator;
pub mod proxy;
pub mod publish_queue;
pub mod reader;
pub mod records;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use environment::Environment;
pub use error::{Result, StoreError};
pub use handlers::{Handler, HandlerProvider, HandlerRegistry, ViewerHandler};
pub use mutator::RecordSourceMutator;
pub use proxy::{RecordProxy, RecordSourceProxy, RecordSourceSelectorProxy};
pub use publish_queue::{PublishQueue, SelectorStoreUpdater, StoreUpdater};
pub use reader::{read, Argument, LinkedField, ReaderNode, ScalarField, Selection};
pub use records::{
    format_storage_key, Backup, FieldValue, InMemoryRecordSource, MutableRecordSource,
    PriorState, Record, RecordSource,
};
pub use store::{RetainHandle, Store, StoreConfig};
pub use subscriptions::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
    SubscriptionManager,
};
pub use types::{
    generate_client_id, DataId, HandleFieldPayload, RecordStatus, ResponsePayload, Selector,
    Snapshot, StoreStats, UpdateId, Variables, ROOT_ID, ROOT_TYPE,
};
