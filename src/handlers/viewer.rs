//! Viewer handler.
//!
//! Keeps a single client-side viewer record in sync with whichever viewer
//! the server last returned, and links it from the root so every query can
//! read it without knowing the server's viewer ID.

use super::Handler;
use crate::error::Result;
use crate::proxy::RecordSourceProxy;
use crate::types::{generate_client_id, HandleFieldPayload, ROOT_ID};
use serde_json::Value;

pub const VIEWER_HANDLE: &str = "viewer";
pub const VIEWER_TYPE: &str = "Viewer";

pub struct ViewerHandler;

impl Handler for ViewerHandler {
    fn update(&self, store: &RecordSourceProxy<'_>, payload: &HandleFieldPayload) -> Result<()> {
        let record = match store.get(&payload.data_id) {
            Some(record) => record,
            None => return Ok(()),
        };

        let server_viewer = match record.get_linked_record(&payload.field_key, None)? {
            Some(viewer) => viewer,
            None => {
                record.set_value(Value::Null, &payload.handle_key, None)?;
                return Ok(());
            }
        };

        let viewer_id = generate_client_id(ROOT_ID, VIEWER_HANDLE, None);
        let client_viewer = match store.get(&viewer_id) {
            Some(viewer) => viewer,
            None => store.create(&viewer_id, VIEWER_TYPE)?,
        };
        client_viewer.copy_fields_from(&server_viewer)?;

        record.set_value(Value::Null, &payload.field_key, None)?;
        record.set_linked_record(&client_viewer, &payload.handle_key, None)?;
        store
            .root()?
            .set_linked_record(&client_viewer, &payload.handle_key, None)?;
        Ok(())
    }
}
