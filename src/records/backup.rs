//! Undo log captured while a transaction writes.

use super::record::Record;
use super::source::{MutableRecordSource, RecordSource};
use crate::types::{DataId, RecordStatus};
use indexmap::IndexMap;

/// What an ID held before a transaction first wrote to it.
#[derive(Clone, Debug, PartialEq)]
pub enum PriorState {
    Existent(Record),
    Nonexistent,
    Unknown,
}

impl PriorState {
    /// Capture the current state of `id` in `source`.
    pub fn capture(source: &dyn RecordSource, id: &str) -> Self {
        match source.status(id) {
            RecordStatus::Existent => match source.get(id) {
                Some(record) => PriorState::Existent(record.clone()),
                None => PriorState::Unknown,
            },
            RecordStatus::Nonexistent => PriorState::Nonexistent,
            RecordStatus::Unknown => PriorState::Unknown,
        }
    }

    pub fn status(&self) -> RecordStatus {
        match self {
            PriorState::Existent(_) => RecordStatus::Existent,
            PriorState::Nonexistent => RecordStatus::Nonexistent,
            PriorState::Unknown => RecordStatus::Unknown,
        }
    }
}

/// Pre-transaction values of every record a transaction touched.
///
/// Entries are first-touch-wins: once an ID is captured, later captures for
/// the same ID are ignored until the backup is cleared.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Backup {
    entries: IndexMap<DataId, PriorState>,
}

impl Backup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&PriorState> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&DataId, &PriorState)> {
        self.entries.iter()
    }

    /// Record `prior` for `id` unless something was already captured.
    ///
    /// Returns whether the entry was written.
    pub fn capture(&mut self, id: &str, prior: impl FnOnce() -> PriorState) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }
        self.entries.insert(DataId::from(id), prior());
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Put every captured ID in `target` back to its prior state.
    ///
    /// Returns the IDs whose state actually changed.
    pub fn restore_into(&self, target: &mut dyn MutableRecordSource) -> Vec<DataId> {
        let mut changed = Vec::new();
        for (id, prior) in &self.entries {
            let differs = match prior {
                PriorState::Existent(record) => target.get(id) != Some(record),
                _ => target.status(id) != prior.status(),
            };
            if !differs {
                continue;
            }
            match prior {
                PriorState::Existent(record) => target.set(id.clone(), record.clone()),
                PriorState::Nonexistent => target.delete(id),
                PriorState::Unknown => target.remove(id),
            }
            changed.push(id.clone());
        }
        changed
    }
}
