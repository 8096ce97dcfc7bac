//! Field handlers: side effects that derive client fields from server data.
//!
//! A committed payload may carry [`HandleFieldPayload`]s naming a handle.
//! The publish queue looks each handle up in a [`HandlerProvider`] and runs
//! it against the payload's transaction before the payload is published.

mod viewer;

pub use viewer::{ViewerHandler, VIEWER_HANDLE, VIEWER_TYPE};

use crate::error::Result;
use crate::proxy::RecordSourceProxy;
use crate::types::HandleFieldPayload;
use std::collections::HashMap;

/// Computes a handle field from freshly written data.
pub trait Handler {
    fn update(&self, store: &RecordSourceProxy<'_>, payload: &HandleFieldPayload) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&RecordSourceProxy<'_>, &HandleFieldPayload) -> Result<()>,
{
    fn update(&self, store: &RecordSourceProxy<'_>, payload: &HandleFieldPayload) -> Result<()> {
        self(store, payload)
    }
}

/// Resolves handle names to handlers.
pub trait HandlerProvider {
    fn get(&self, handle: &str) -> Option<&dyn Handler>;
}

/// Map-backed [`HandlerProvider`].
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers installed.
    pub fn with_defaults() -> Self {
        Self::new().with(VIEWER_HANDLE, ViewerHandler)
    }

    pub fn register(&mut self, handle: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers.insert(handle.into(), Box::new(handler));
    }

    pub fn with(mut self, handle: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.register(handle, handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl HandlerProvider for HandlerRegistry {
    fn get(&self, handle: &str) -> Option<&dyn Handler> {
        self.handlers.get(handle).map(|handler| handler.as_ref())
    }
}
