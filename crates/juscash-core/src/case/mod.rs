//! Case records.
//!
//! A case record arrives as JSON from the upstream court-data system. It is
//! validated against the embedded JSON Schema and then deserialized into
//! [`CaseRecord`]. The pipeline only ever reads it.

mod record;
mod schema;
mod timestamp;

pub use record::{CaseError, CaseRecord, Document, Movement};
pub use schema::validate_case_schema;
pub use timestamp::parse_timestamp;
