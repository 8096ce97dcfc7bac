//! Store-wide proxy handed to updaters.

use super::record_proxy::RecordProxy;
use crate::error::{Result, StoreError};
use crate::mutator::RecordSourceMutator;
use crate::types::{DataId, RecordStatus, ROOT_ID, ROOT_TYPE};
use std::cell::{Ref, RefCell, RefMut};

/// Mutable view of the store during one transaction.
///
/// Record proxies borrow this view and hold only an ID, so any number of them
/// can be alive at once.
pub struct RecordSourceProxy<'m> {
    mutator: RefCell<RecordSourceMutator<'m>>,
}

impl<'m> RecordSourceProxy<'m> {
    pub fn new(mutator: RecordSourceMutator<'m>) -> Self {
        Self {
            mutator: RefCell::new(mutator),
        }
    }

    pub fn create(&self, id: &str, type_name: &str) -> Result<RecordProxy<'_, 'm>> {
        self.mutator_mut().create(id, type_name)?;
        Ok(RecordProxy::new(self, DataId::from(id)))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        if id == ROOT_ID {
            return Err(StoreError::CannotDeleteRoot);
        }
        self.mutator_mut().delete(id);
        Ok(())
    }

    /// Proxy for `id` if the record exists.
    pub fn get(&self, id: &str) -> Option<RecordProxy<'_, 'm>> {
        match self.status(id) {
            RecordStatus::Existent => Some(RecordProxy::new(self, DataId::from(id))),
            _ => None,
        }
    }

    pub fn status(&self, id: &str) -> RecordStatus {
        self.mutator().status(id)
    }

    /// The root record, created on first access.
    pub fn root(&self) -> Result<RecordProxy<'_, 'm>> {
        match self.get(ROOT_ID) {
            Some(root) => Ok(root),
            None => self.create(ROOT_ID, ROOT_TYPE),
        }
    }

    /// Consume the proxy, giving back the mutator.
    pub fn into_mutator(self) -> RecordSourceMutator<'m> {
        self.mutator.into_inner()
    }

    pub(crate) fn mutator(&self) -> Ref<'_, RecordSourceMutator<'m>> {
        self.mutator.borrow()
    }

    pub(crate) fn mutator_mut(&self) -> RefMut<'_, RecordSourceMutator<'m>> {
        self.mutator.borrow_mut()
    }
}
