//! Ergonomic proxies over a transaction's mutator.
//!
//! Proxies hold no state of their own: a [`RecordProxy`] is a borrowed view
//! plus an ID, recreated on every access.

mod record_proxy;
mod selector_proxy;
mod source_proxy;

pub use record_proxy::RecordProxy;
pub use selector_proxy::RecordSourceSelectorProxy;
pub use source_proxy::RecordSourceProxy;
