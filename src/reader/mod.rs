//! Reading snapshots out of the store.
//!
//! A [`ReaderNode`] describes which fields to follow from a selector's root
//! record; [`read`] walks them and records every record it visited so the
//! store can tell which subscriptions a later write affects.

mod node;
mod read;

pub use node::{resolve_arguments, Argument, LinkedField, ReaderNode, ScalarField, Selection};
pub use read::read;
