//! Normalized records and the sources that hold them.
//!
//! A record is a string-keyed bag of scalars and links to other records. A
//! record source maps IDs to records and remembers which IDs are known to be
//! absent, so readers can tell "deleted" apart from "never fetched".

mod backup;
mod record;
mod source;
mod storage_key;

pub use backup::{Backup, PriorState};
pub use record::{FieldValue, Record, ID_KEY, TYPENAME_KEY};
pub use source::{InMemoryRecordSource, MutableRecordSource, RecordSource};
pub use storage_key::format_storage_key;
