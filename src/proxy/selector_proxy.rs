//! Proxy scoped to the selector a payload was fetched for.

use super::record_proxy::RecordProxy;
use super::source_proxy::RecordSourceProxy;
use crate::error::{Result, StoreError};
use crate::reader::{resolve_arguments, LinkedField};
use crate::types::Selector;
use std::ops::Deref;

/// A [`RecordSourceProxy`] that also knows the selector's root fields.
pub struct RecordSourceSelectorProxy<'m> {
    proxy: RecordSourceProxy<'m>,
    selector: Selector,
}

impl<'m> RecordSourceSelectorProxy<'m> {
    pub fn new(proxy: RecordSourceProxy<'m>, selector: Selector) -> Self {
        Self { proxy, selector }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// The record a singular root field of the selector points at.
    pub fn get_root_field(&self, name: &str) -> Result<Option<RecordProxy<'_, 'm>>> {
        let field = self.root_field(name, false)?;
        let args = resolve_arguments(&field.args, &self.selector.variables);
        match self.proxy.get(&self.selector.data_id) {
            Some(root) => root.get_linked_record(&field.name, Some(&args)),
            None => Ok(None),
        }
    }

    /// The records a plural root field of the selector points at.
    pub fn get_plural_root_field(
        &self,
        name: &str,
    ) -> Result<Option<Vec<Option<RecordProxy<'_, 'm>>>>> {
        let field = self.root_field(name, true)?;
        let args = resolve_arguments(&field.args, &self.selector.variables);
        match self.proxy.get(&self.selector.data_id) {
            Some(root) => root.get_linked_records(&field.name, Some(&args)),
            None => Ok(None),
        }
    }

    pub fn into_inner(self) -> RecordSourceProxy<'m> {
        self.proxy
    }

    fn root_field(&self, name: &str, plural: bool) -> Result<&LinkedField> {
        let field = self
            .selector
            .node
            .find_linked_field(name)
            .ok_or_else(|| StoreError::UnknownRootField(name.to_string()))?;
        if field.plural != plural {
            return Err(StoreError::InvalidOperation(format!(
                "root field `{}` is {}plural",
                name,
                if field.plural { "" } else { "not " }
            )));
        }
        Ok(field)
    }
}

impl<'m> Deref for RecordSourceSelectorProxy<'m> {
    type Target = RecordSourceProxy<'m>;

    fn deref(&self) -> &Self::Target {
        &self.proxy
    }
}
