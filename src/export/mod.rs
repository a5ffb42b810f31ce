//! Newline-delimited JSON export
//!
//! One complete episode document per line, in ledger order, read from a
//! snapshot taken when the export starts. Each record is encoded
//! independently, so a consumer can stop at any line boundary and a
//! producer holds at most one episode in memory.

mod ndjson;

pub use ndjson::{export_records, write_ndjson, NdjsonRecords, CONTENT_TYPE};
