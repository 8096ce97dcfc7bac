//! A single normalized record.

use crate::error::{Result, StoreError};
use crate::types::DataId;
use indexmap::IndexMap;
use serde_json::Value;

/// Storage key under which a record's ID is exposed to readers.
pub const ID_KEY: &str = "__id";

/// Storage key under which a record's type name is exposed to readers.
pub const TYPENAME_KEY: &str = "__typename";

/// Value stored under one storage key.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    Link(DataId),
    LinkList(Vec<DataId>),
    Null,
}

impl FieldValue {
    /// Wrap a JSON value, mapping JSON null to [`FieldValue::Null`].
    pub fn scalar(value: Value) -> Self {
        if value.is_null() {
            FieldValue::Null
        } else {
            FieldValue::Scalar(value)
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Scalar(_) => "a scalar",
            FieldValue::Link(_) => "a linked record",
            FieldValue::LinkList(_) => "a list of linked records",
            FieldValue::Null => "null",
        }
    }
}

/// Field map describing one graph node.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    id: DataId,
    type_name: String,
    fields: IndexMap<String, FieldValue>,
}

impl Record {
    pub fn new(id: impl Into<DataId>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &DataId {
        &self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Scalar value under `key`. `Some(Value::Null)` for an explicit null.
    pub fn get_value(&self, key: &str) -> Result<Option<Value>> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(FieldValue::Scalar(value)) => Ok(Some(value.clone())),
            Some(FieldValue::Null) => Ok(Some(Value::Null)),
            Some(_) => Err(self.unexpected(key, "a scalar")),
        }
    }

    /// Linked ID under `key`. `Ok(None)` when missing or null.
    pub fn get_linked_record_id(&self, key: &str) -> Result<Option<DataId>> {
        match self.fields.get(key) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Link(id)) => Ok(Some(id.clone())),
            Some(_) => Err(self.unexpected(key, "a linked record")),
        }
    }

    /// Linked IDs under `key`. `Ok(None)` when missing or null.
    pub fn get_linked_record_ids(&self, key: &str) -> Result<Option<Vec<DataId>>> {
        match self.fields.get(key) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::LinkList(ids)) => Ok(Some(ids.clone())),
            Some(_) => Err(self.unexpected(key, "a list of linked records")),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
        self.set(key, FieldValue::scalar(value));
    }

    pub fn set_linked_record_id(&mut self, key: impl Into<String>, id: DataId) {
        self.set(key, FieldValue::Link(id));
    }

    pub fn set_linked_record_ids(&mut self, key: impl Into<String>, ids: Vec<DataId>) {
        self.set(key, FieldValue::LinkList(ids));
    }

    /// Copy every field of `source` into this record, keeping ID and type.
    pub fn copy_fields_from(&mut self, source: &Record) {
        for (key, value) in &source.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Merge `next` over this record.
    ///
    /// Returns `None` when the merge would not change anything, so callers can
    /// skip marking the record as updated.
    pub fn update(&self, next: &Record) -> Option<Record> {
        if self.id != next.id {
            tracing::warn!(prev = %self.id, next = %next.id, "merging records with different IDs");
        }
        let type_changed = self.type_name != next.type_name;
        if type_changed {
            tracing::warn!(
                id = %self.id,
                prev = %self.type_name,
                next = %next.type_name,
                "record type name changed"
            );
        }

        let changed = type_changed
            || next
                .fields
                .iter()
                .any(|(key, value)| self.fields.get(key) != Some(value));
        if !changed {
            return None;
        }

        let mut merged = self.clone();
        merged.type_name = next.type_name.clone();
        merged.copy_fields_from(next);
        Some(merged)
    }

    fn unexpected(&self, key: &str, expected: &'static str) -> StoreError {
        let found = self.fields.get(key).map(FieldValue::kind).unwrap_or("missing");
        tracing::trace!(id = %self.id, key, found, "field type mismatch");
        StoreError::UnexpectedFieldType {
            id: self.id.clone(),
            key: key.to_string(),
            expected,
        }
    }
}
