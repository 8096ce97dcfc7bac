//! Core types for the graph store.

use crate::reader::ReaderNode;
use crate::records::InMemoryRecordSource;
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// ID of the root record every query starts from.
pub const ROOT_ID: &str = "client:root";

/// Type name given to the root record.
pub const ROOT_TYPE: &str = "__Root";

/// Prefix for IDs generated on the client.
pub const CLIENT_ID_PREFIX: &str = "client:";

/// Variables a selector is evaluated with.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// Opaque identifier for one node in the graph.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataId(String);

impl DataId {
    pub fn new(id: impl Into<String>) -> Self {
        DataId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this ID was generated on the client rather than by the server.
    pub fn is_client_id(&self) -> bool {
        self.0.starts_with(CLIENT_ID_PREFIX)
    }
}

impl fmt::Debug for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataId({})", self.0)
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for DataId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DataId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DataId {
    fn from(id: &str) -> Self {
        DataId(id.to_string())
    }
}

impl From<String> for DataId {
    fn from(id: String) -> Self {
        DataId(id)
    }
}

/// Build the ID of a record owned by a field of another record.
///
/// `client:<id>:<storage_key>`, with `:<index>` appended for items of a
/// plural field.
pub fn generate_client_id(id: &str, storage_key: &str, index: Option<usize>) -> DataId {
    let mut key = if id.starts_with(CLIENT_ID_PREFIX) {
        format!("{}:{}", id, storage_key)
    } else {
        format!("{}{}:{}", CLIENT_ID_PREFIX, id, storage_key)
    };
    if let Some(index) = index {
        key.push(':');
        key.push_str(&index.to_string());
    }
    DataId(key)
}

/// Existence status of an ID within a record source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    /// A record is present.
    Existent,
    /// Known to be absent (tombstoned).
    Nonexistent,
    /// Never observed; would need fetching.
    Unknown,
}

/// Starting point and parameterization of a graph traversal.
///
/// Equality is structural over all three parts.
#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    pub data_id: DataId,
    pub node: Arc<ReaderNode>,
    pub variables: Variables,
}

impl Selector {
    pub fn new(data_id: impl Into<DataId>, node: Arc<ReaderNode>, variables: Variables) -> Self {
        Self {
            data_id: data_id.into(),
            node,
            variables,
        }
    }

    /// Selector over the root record with no variables.
    pub fn root(node: Arc<ReaderNode>) -> Self {
        Self::new(ROOT_ID, node, Variables::new())
    }
}

/// Result of reading a selector: the data plus every record visited.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub selector: Selector,
    /// `None` when the root record is unknown.
    pub data: Option<serde_json::Value>,
    pub seen_records: HashSet<DataId>,
    pub is_missing_data: bool,
}

/// A derived field that a registered handler must (re)compute.
#[derive(Clone, Debug, PartialEq)]
pub struct HandleFieldPayload {
    /// Record holding the field.
    pub data_id: DataId,
    /// Storage key the server data was written under.
    pub field_key: String,
    /// Name of the handler.
    pub handle: String,
    /// Storage key the handler writes its result under.
    pub handle_key: String,
    pub args: Variables,
}

/// Normalized server response ready to commit.
#[derive(Clone, Debug, Default)]
pub struct ResponsePayload {
    pub source: InMemoryRecordSource,
    pub field_payloads: Vec<HandleFieldPayload>,
}

impl ResponsePayload {
    pub fn new(source: InMemoryRecordSource) -> Self {
        Self {
            source,
            field_payloads: Vec::new(),
        }
    }

    pub fn with_field_payloads(mut self, field_payloads: Vec<HandleFieldPayload>) -> Self {
        self.field_payloads = field_payloads;
        self
    }
}

static NEXT_UPDATE_ID: AtomicU64 = AtomicU64::new(1);

/// Token identifying one optimistic update.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateId(pub u64);

impl UpdateId {
    /// Mint a token that has never been handed out before.
    pub fn next() -> Self {
        UpdateId(NEXT_UPDATE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpdateId({})", self.0)
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub record_count: usize,
    pub subscription_count: usize,
    pub retained_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_client_id() {
        assert_eq!(generate_client_id("4", "friend", None).as_str(), "client:4:friend");
        assert_eq!(
            generate_client_id("4", "friends(first:2)", Some(1)).as_str(),
            "client:4:friends(first:2):1"
        );
    }

    #[test]
    fn test_generate_client_id_nested() {
        let id = generate_client_id(ROOT_ID, "viewer", None);
        assert_eq!(id.as_str(), "client:root:viewer");
        assert!(id.is_client_id());
    }

    #[test]
    fn test_update_ids_are_unique() {
        let a = UpdateId::next();
        let b = UpdateId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_data_id_borrows_as_str() {
        let mut set = HashSet::new();
        set.insert(DataId::from("4"));
        assert!(set.contains("4"));
    }
}
