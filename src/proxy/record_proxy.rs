//! Per-record proxy.

use super::source_proxy::RecordSourceProxy;
use crate::error::Result;
use crate::records::format_storage_key;
use crate::types::{generate_client_id, DataId, Variables};
use serde_json::Value;

/// Field-level view of one record inside a transaction.
///
/// Field operations take the schema field name plus its arguments and
/// address the record by the derived storage key.
#[derive(Clone)]
pub struct RecordProxy<'p, 'm> {
    source: &'p RecordSourceProxy<'m>,
    id: DataId,
}

impl<'p, 'm> RecordProxy<'p, 'm> {
    pub(crate) fn new(source: &'p RecordSourceProxy<'m>, id: DataId) -> Self {
        Self { source, id }
    }

    pub fn data_id(&self) -> &DataId {
        &self.id
    }

    pub fn type_name(&self) -> Option<String> {
        self.source.mutator().get_type(&self.id)
    }

    /// Scalar value of a field. `Some(Value::Null)` for an explicit null,
    /// `None` when the field has never been written.
    pub fn get_value(&self, name: &str, args: Option<&Variables>) -> Result<Option<Value>> {
        let key = format_storage_key(name, args);
        self.source.mutator().get_value(&self.id, &key)
    }

    pub fn set_value(&self, value: Value, name: &str, args: Option<&Variables>) -> Result<&Self> {
        let key = format_storage_key(name, args);
        self.source.mutator_mut().set_value(&self.id, &key, value)?;
        Ok(self)
    }

    /// The record a field links to, if it is set and that record exists.
    pub fn get_linked_record(
        &self,
        name: &str,
        args: Option<&Variables>,
    ) -> Result<Option<RecordProxy<'p, 'm>>> {
        let key = format_storage_key(name, args);
        let linked_id = self.source.mutator().get_linked_record_id(&self.id, &key)?;
        Ok(linked_id.and_then(|id| self.source.get(&id)))
    }

    /// Records a plural field links to. Items whose record does not exist are
    /// `None`.
    pub fn get_linked_records(
        &self,
        name: &str,
        args: Option<&Variables>,
    ) -> Result<Option<Vec<Option<RecordProxy<'p, 'm>>>>> {
        let key = format_storage_key(name, args);
        let linked_ids = self.source.mutator().get_linked_record_ids(&self.id, &key)?;
        Ok(linked_ids.map(|ids| ids.iter().map(|id| self.source.get(id)).collect()))
    }

    pub fn set_linked_record(
        &self,
        record: &RecordProxy<'_, '_>,
        name: &str,
        args: Option<&Variables>,
    ) -> Result<&Self> {
        let key = format_storage_key(name, args);
        self.source
            .mutator_mut()
            .set_linked_record_id(&self.id, &key, record.id.clone())?;
        Ok(self)
    }

    pub fn set_linked_records(
        &self,
        records: &[RecordProxy<'_, '_>],
        name: &str,
        args: Option<&Variables>,
    ) -> Result<&Self> {
        let key = format_storage_key(name, args);
        let ids = records.iter().map(|record| record.id.clone()).collect();
        self.source
            .mutator_mut()
            .set_linked_record_ids(&self.id, &key, ids)?;
        Ok(self)
    }

    /// The linked record, or a new client record linked under the field.
    pub fn get_or_create_linked_record(
        &self,
        name: &str,
        type_name: &str,
        args: Option<&Variables>,
    ) -> Result<RecordProxy<'p, 'm>> {
        if let Some(linked) = self.get_linked_record(name, args)? {
            return Ok(linked);
        }
        let key = format_storage_key(name, args);
        let client_id = generate_client_id(&self.id, &key, None);
        let linked = match self.source.get(&client_id) {
            Some(existing) => existing,
            None => self.source.create(&client_id, type_name)?,
        };
        self.set_linked_record(&linked, name, args)?;
        Ok(linked)
    }

    /// Shallow-copy every field of `source` onto this record.
    pub fn copy_fields_from(&self, source: &RecordProxy<'_, '_>) -> Result<()> {
        self.source.mutator_mut().copy_fields(&source.id, &self.id)
    }
}

impl std::fmt::Debug for RecordProxy<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordProxy").field("id", &self.id).finish()
    }
}
