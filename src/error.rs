//! Error types for the graph store.

use crate::types::{DataId, UpdateId};
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Optimistic update already applied or pending: {0}")]
    UpdateAlreadyApplied(UpdateId),

    #[error("No handler registered for handle `{0}`")]
    MissingHandler(String),

    #[error("Cannot create record `{0}`, a record already exists")]
    RecordExists(DataId),

    #[error("Record not found: {0}")]
    RecordNotFound(DataId),

    #[error("Cannot delete the root record")]
    CannotDeleteRoot,

    #[error("Expected `{key}` on record `{id}` to be {expected}")]
    UnexpectedFieldType {
        id: DataId,
        key: String,
        expected: &'static str,
    },

    #[error("Root field not found in selector: {0}")]
    UnknownRootField(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
