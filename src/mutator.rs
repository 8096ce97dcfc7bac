//! Copy-on-write overlay used by every store transaction.
//!
//! A mutator presents "the store as it will look after this transaction"
//! while writing only to a small sink. Reads check the sink first and fall
//! back to the read-only base. When a backup is supplied, the first write to
//! any ID captures that ID's pre-transaction state, which yields an exact
//! undo log for free.

use crate::error::{Result, StoreError};
use crate::records::{
    Backup, FieldValue, MutableRecordSource, PriorState, Record, RecordSource,
};
use crate::types::{DataId, RecordStatus};
use serde_json::Value;

/// Overlay of a write sink (and optional backup) over a base source.
pub struct RecordSourceMutator<'a> {
    base: &'a dyn RecordSource,
    sink: &'a mut dyn MutableRecordSource,
    backup: Option<&'a mut Backup>,
}

impl<'a> RecordSourceMutator<'a> {
    pub fn new(
        base: &'a dyn RecordSource,
        sink: &'a mut dyn MutableRecordSource,
        backup: Option<&'a mut Backup>,
    ) -> Self {
        Self { base, sink, backup }
    }

    pub fn status(&self, id: &str) -> RecordStatus {
        match self.sink.status(id) {
            RecordStatus::Unknown => self.base.status(id),
            status => status,
        }
    }

    /// Type name of `id` through the overlay. `None` unless the record exists.
    pub fn get_type(&self, id: &str) -> Option<String> {
        match self.sink.status(id) {
            RecordStatus::Existent => self.sink.get(id),
            RecordStatus::Nonexistent => None,
            RecordStatus::Unknown => self.base.get(id),
        }
        .map(|record| record.type_name().to_string())
    }

    /// Raw field value, sink first. `None` when missing or the record is absent.
    pub fn get_field(&self, id: &str, key: &str) -> Option<FieldValue> {
        self.lookup(id, key, |record| Ok(record.get(key).cloned()))
            .ok()
            .flatten()
    }

    pub fn get_value(&self, id: &str, key: &str) -> Result<Option<Value>> {
        self.lookup(id, key, |record| record.get_value(key))
    }

    pub fn get_linked_record_id(&self, id: &str, key: &str) -> Result<Option<DataId>> {
        self.lookup(id, key, |record| record.get_linked_record_id(key))
    }

    pub fn get_linked_record_ids(&self, id: &str, key: &str) -> Result<Option<Vec<DataId>>> {
        self.lookup(id, key, |record| record.get_linked_record_ids(key))
    }

    /// The record as it currently looks through the overlay.
    pub fn record(&self, id: &str) -> Option<Record> {
        match current_state(self.base, &*self.sink, id) {
            PriorState::Existent(record) => Some(record),
            _ => None,
        }
    }

    pub fn create(&mut self, id: &str, type_name: &str) -> Result<()> {
        if self.status(id) == RecordStatus::Existent {
            return Err(StoreError::RecordExists(DataId::from(id)));
        }
        self.capture(id);
        self.sink.set(DataId::from(id), Record::new(id, type_name));
        Ok(())
    }

    pub fn delete(&mut self, id: &str) {
        self.capture(id);
        self.sink.delete(id);
    }

    pub fn set_value(&mut self, id: &str, key: &str, value: Value) -> Result<()> {
        self.sink_record(id)?.set_value(key, value);
        Ok(())
    }

    pub fn set_linked_record_id(&mut self, id: &str, key: &str, linked_id: DataId) -> Result<()> {
        self.sink_record(id)?.set_linked_record_id(key, linked_id);
        Ok(())
    }

    pub fn set_linked_record_ids(
        &mut self,
        id: &str,
        key: &str,
        linked_ids: Vec<DataId>,
    ) -> Result<()> {
        self.sink_record(id)?.set_linked_record_ids(key, linked_ids);
        Ok(())
    }

    /// Copy every field of `source_id` onto `sink_id`.
    pub fn copy_fields(&mut self, source_id: &str, sink_id: &str) -> Result<()> {
        let source = self
            .record(source_id)
            .ok_or_else(|| StoreError::RecordNotFound(DataId::from(source_id)))?;
        self.copy_fields_from_record(&source, sink_id)
    }

    pub fn copy_fields_from_record(&mut self, source: &Record, sink_id: &str) -> Result<()> {
        self.sink_record(sink_id)?.copy_fields_from(source);
        Ok(())
    }

    /// Find the first layer that has `key` for `id` and read it with `read`.
    fn lookup<T>(
        &self,
        id: &str,
        key: &str,
        read: impl Fn(&Record) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        match self.sink.status(id) {
            RecordStatus::Nonexistent => return Ok(None),
            RecordStatus::Existent => {
                if let Some(record) = self.sink.get(id).filter(|r| r.get(key).is_some()) {
                    return read(record);
                }
            }
            RecordStatus::Unknown => {}
        }
        match self.base.get(id) {
            Some(record) if record.get(key).is_some() => read(record),
            _ => Ok(None),
        }
    }

    /// Sink copy of `id` ready for writing, capturing the backup first.
    fn sink_record(&mut self, id: &str) -> Result<&mut Record> {
        if self.status(id) != RecordStatus::Existent {
            return Err(StoreError::RecordNotFound(DataId::from(id)));
        }
        self.capture(id);

        if self.sink.status(id) == RecordStatus::Unknown {
            let type_name = self
                .base
                .get(id)
                .map(|record| record.type_name().to_string())
                .ok_or_else(|| StoreError::RecordNotFound(DataId::from(id)))?;
            self.sink.set(DataId::from(id), Record::new(id, type_name));
        }
        self.sink
            .get_mut(id)
            .ok_or_else(|| StoreError::RecordNotFound(DataId::from(id)))
    }

    fn capture(&mut self, id: &str) {
        let Self { base, sink, backup } = self;
        if let Some(backup) = backup.as_deref_mut() {
            if backup.capture(id, || current_state(*base, &**sink, id)) {
                tracing::trace!(id, "captured backup");
            }
        }
    }
}

/// State of `id` through the overlay: the sink's partial record merged over
/// the base record.
fn current_state(
    base: &dyn RecordSource,
    sink: &dyn MutableRecordSource,
    id: &str,
) -> PriorState {
    match sink.status(id) {
        RecordStatus::Existent => match (base.get(id), sink.get(id)) {
            (Some(base_record), Some(sink_record)) => PriorState::Existent(
                base_record
                    .update(sink_record)
                    .unwrap_or_else(|| base_record.clone()),
            ),
            (None, Some(sink_record)) => PriorState::Existent(sink_record.clone()),
            (_, None) => PriorState::Unknown,
        },
        RecordStatus::Nonexistent => PriorState::Nonexistent,
        RecordStatus::Unknown => PriorState::capture(base, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::InMemoryRecordSource;
    use serde_json::json;

    fn base() -> InMemoryRecordSource {
        InMemoryRecordSource::from_json(&json!({
            "4": {"__id": "4", "__typename": "User", "name": "Zuck", "bestFriend": {"__ref": "5"}},
            "5": {"__id": "5", "__typename": "User", "name": "Mark"},
            "9": null
        }))
        .unwrap()
    }

    #[test]
    fn test_get_type_respects_sink_tombstone() {
        let base = base();
        let mut sink = InMemoryRecordSource::new();
        let mut mutator = RecordSourceMutator::new(&base, &mut sink, None);

        assert_eq!(mutator.get_type("4").as_deref(), Some("User"));
        mutator.delete("4");
        assert_eq!(mutator.get_type("4"), None);
        assert_eq!(mutator.get_type("9"), None);

        mutator.create("4", "Page").unwrap();
        assert_eq!(mutator.get_type("4").as_deref(), Some("Page"));
    }

    #[test]
    fn test_reads_fall_through_to_base() {
        let base = base();
        let mut sink = InMemoryRecordSource::new();
        let mutator = RecordSourceMutator::new(&base, &mut sink, None);

        assert_eq!(mutator.status("4"), RecordStatus::Existent);
        assert_eq!(mutator.status("9"), RecordStatus::Nonexistent);
        assert_eq!(mutator.status("10"), RecordStatus::Unknown);
        assert_eq!(mutator.get_value("4", "name").unwrap(), Some(json!("Zuck")));
        assert_eq!(
            mutator.get_linked_record_id("4", "bestFriend").unwrap(),
            Some(DataId::from("5"))
        );
        assert_eq!(mutator.get_type("5").as_deref(), Some("User"));
    }

    #[test]
    fn test_writes_only_touch_sink() {
        let base = base();
        let mut sink = InMemoryRecordSource::new();
        {
            let mut mutator = RecordSourceMutator::new(&base, &mut sink, None);
            mutator.set_value("4", "name", json!("Greg")).unwrap();
            assert_eq!(mutator.get_value("4", "name").unwrap(), Some(json!("Greg")));
            assert_eq!(
                mutator.get_linked_record_id("4", "bestFriend").unwrap(),
                Some(DataId::from("5"))
            );
        }

        assert_eq!(base.get("4").unwrap().get_value("name").unwrap(), Some(json!("Zuck")));
        let written = sink.get("4").unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written.type_name(), "User");
    }

    #[test]
    fn test_sink_tombstone_hides_base() {
        let base = base();
        let mut sink = InMemoryRecordSource::new();
        let mut mutator = RecordSourceMutator::new(&base, &mut sink, None);

        mutator.delete("4");
        assert_eq!(mutator.status("4"), RecordStatus::Nonexistent);
        assert_eq!(mutator.get_value("4", "name").unwrap(), None);
        assert!(matches!(
            mutator.set_value("4", "name", json!("x")),
            Err(StoreError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_create_rejects_existing() {
        let base = base();
        let mut sink = InMemoryRecordSource::new();
        let mut mutator = RecordSourceMutator::new(&base, &mut sink, None);

        assert!(matches!(
            mutator.create("4", "User"),
            Err(StoreError::RecordExists(_))
        ));
        mutator.create("6", "User").unwrap();
        assert!(matches!(
            mutator.create("6", "User"),
            Err(StoreError::RecordExists(_))
        ));
        // Tombstoned IDs may be recreated.
        mutator.create("9", "User").unwrap();
    }

    #[test]
    fn test_backup_captures_first_touch_only() {
        let base = base();
        let mut sink = InMemoryRecordSource::new();
        let mut backup = Backup::new();
        {
            let mut mutator = RecordSourceMutator::new(&base, &mut sink, Some(&mut backup));
            mutator.set_value("4", "name", json!("A")).unwrap();
            mutator.set_value("4", "name", json!("B")).unwrap();
            mutator.create("6", "User").unwrap();
            mutator.delete("9");
        }

        assert_eq!(backup.len(), 3);
        assert_eq!(
            backup.get("4"),
            Some(&PriorState::Existent(base.get("4").unwrap().clone()))
        );
        assert_eq!(backup.get("6"), Some(&PriorState::Unknown));
        assert_eq!(backup.get("9"), Some(&PriorState::Nonexistent));
    }

    #[test]
    fn test_failed_write_captures_nothing() {
        let base = base();
        let mut sink = InMemoryRecordSource::new();
        let mut backup = Backup::new();
        {
            let mut mutator = RecordSourceMutator::new(&base, &mut sink, Some(&mut backup));
            assert!(mutator.set_value("missing", "name", json!("x")).is_err());
        }
        assert!(backup.is_empty());
    }

    #[test]
    fn test_copy_fields() {
        let base = base();
        let mut sink = InMemoryRecordSource::new();
        let mut mutator = RecordSourceMutator::new(&base, &mut sink, None);

        mutator.set_value("4", "age", json!(30)).unwrap();
        mutator.copy_fields("4", "5").unwrap();

        assert_eq!(mutator.get_value("5", "name").unwrap(), Some(json!("Zuck")));
        assert_eq!(mutator.get_value("5", "age").unwrap(), Some(json!(30)));
        assert_eq!(mutator.get_type("5").as_deref(), Some("User"));
        assert!(matches!(
            mutator.copy_fields("missing", "5"),
            Err(StoreError::RecordNotFound(_))
        ));
    }
}
