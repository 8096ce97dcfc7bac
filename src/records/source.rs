//! Record sources: keyed collections of records with existence status.

use super::record::{FieldValue, Record, ID_KEY, TYPENAME_KEY};
use crate::error::{Result, StoreError};
use crate::types::{DataId, RecordStatus};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Read access to a collection of records.
pub trait RecordSource {
    /// The record for `id`, if one exists.
    fn get(&self, id: &str) -> Option<&Record>;

    fn status(&self, id: &str) -> RecordStatus;

    /// Whether the source knows anything about `id`, including a tombstone.
    fn has(&self, id: &str) -> bool {
        self.status(id) != RecordStatus::Unknown
    }

    fn size(&self) -> usize;

    fn record_ids(&self) -> Vec<DataId>;

    /// Load a record, answering through `callback`.
    ///
    /// Sources that hold everything in memory answer synchronously.
    fn load(&self, id: &str, callback: &mut dyn FnMut(Result<Option<&Record>>)) {
        callback(Ok(self.get(id)));
    }
}

/// A record source that can be written to.
pub trait MutableRecordSource: RecordSource {
    fn get_mut(&mut self, id: &str) -> Option<&mut Record>;

    fn set(&mut self, id: DataId, record: Record);

    /// Tombstone `id`: its status becomes [`RecordStatus::Nonexistent`].
    fn delete(&mut self, id: &str);

    /// Forget `id`: its status becomes [`RecordStatus::Unknown`].
    fn remove(&mut self, id: &str);

    fn clear(&mut self);
}

/// Hash-map backed record source. `None` entries are tombstones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InMemoryRecordSource {
    records: IndexMap<DataId, Option<Record>>,
}

impl InMemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Build a source from a JSON object of records.
    ///
    /// Each record is an object carrying `__id` and `__typename`; links are
    /// encoded as `{"__ref": id}` and link lists as `{"__refs": [ids]}`. A
    /// `null` record is a tombstone.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| StoreError::InvalidOperation("record source must be an object".into()))?;

        let mut source = Self::new();
        for (id, record) in object {
            let id = DataId::from(id.as_str());
            match record {
                Value::Null => source.delete(&id),
                Value::Object(fields) => {
                    let record = record_from_json(&id, fields)?;
                    source.set(id, record);
                }
                _ => {
                    return Err(StoreError::InvalidOperation(format!(
                        "record `{}` must be an object or null",
                        id
                    )))
                }
            }
        }
        Ok(source)
    }

    /// Encode the source in the format accepted by [`from_json`](Self::from_json).
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (id, record) in &self.records {
            let value = match record {
                Some(record) => record_to_json(record),
                None => Value::Null,
            };
            object.insert(id.to_string(), value);
        }
        Value::Object(object)
    }
}

impl RecordSource for InMemoryRecordSource {
    fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id).and_then(Option::as_ref)
    }

    fn status(&self, id: &str) -> RecordStatus {
        match self.records.get(id) {
            Some(Some(_)) => RecordStatus::Existent,
            Some(None) => RecordStatus::Nonexistent,
            None => RecordStatus::Unknown,
        }
    }

    fn size(&self) -> usize {
        self.records.len()
    }

    fn record_ids(&self) -> Vec<DataId> {
        self.records.keys().cloned().collect()
    }
}

impl MutableRecordSource for InMemoryRecordSource {
    fn get_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.records.get_mut(id).and_then(Option::as_mut)
    }

    fn set(&mut self, id: DataId, record: Record) {
        self.records.insert(id, Some(record));
    }

    fn delete(&mut self, id: &str) {
        self.records.insert(DataId::from(id), None);
    }

    fn remove(&mut self, id: &str) {
        self.records.shift_remove(id);
    }

    fn clear(&mut self) {
        self.records.clear();
    }
}

fn record_from_json(id: &DataId, fields: &Map<String, Value>) -> Result<Record> {
    let type_name = fields
        .get(TYPENAME_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            StoreError::InvalidOperation(format!("record `{}` is missing `{}`", id, TYPENAME_KEY))
        })?;

    let mut record = Record::new(id.clone(), type_name);
    for (key, value) in fields {
        if key == ID_KEY || key == TYPENAME_KEY {
            continue;
        }
        record.set(key.clone(), field_from_json(value)?);
    }
    Ok(record)
}

fn field_from_json(value: &Value) -> Result<FieldValue> {
    if let Value::Object(map) = value {
        if let Some(Value::String(id)) = map.get("__ref") {
            return Ok(FieldValue::Link(DataId::from(id.as_str())));
        }
        if let Some(Value::Array(ids)) = map.get("__refs") {
            let ids = ids
                .iter()
                .map(|id| {
                    id.as_str().map(DataId::from).ok_or_else(|| {
                        StoreError::InvalidOperation("`__refs` entries must be strings".into())
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(FieldValue::LinkList(ids));
        }
    }
    Ok(FieldValue::scalar(value.clone()))
}

fn record_to_json(record: &Record) -> Value {
    let mut object = Map::new();
    object.insert(ID_KEY.to_string(), Value::String(record.id().to_string()));
    object.insert(TYPENAME_KEY.to_string(), Value::String(record.type_name().to_string()));
    for (key, value) in record.fields() {
        let encoded = match value {
            FieldValue::Scalar(v) => v.clone(),
            FieldValue::Null => Value::Null,
            FieldValue::Link(id) => serde_json::json!({ "__ref": id.as_str() }),
            FieldValue::LinkList(ids) => {
                let ids: Vec<&str> = ids.iter().map(DataId::as_str).collect();
                serde_json::json!({ "__refs": ids })
            }
        };
        object.insert(key.to_string(), encoded);
    }
    Value::Object(object)
}
