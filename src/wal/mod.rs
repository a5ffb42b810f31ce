//! Write-ahead log for the episode ledger
//!
//! Every `put` is first appended here as a single record holding the whole
//! episode. No episode is acknowledged, or visible to readers, until its
//! record has been fsynced.
//!
//! # Design Principles
//!
//! - Durability over throughput: one fsync per append
//! - One record per episode, so an episode and its steps share one fate
//! - Explicit failure over silent repair
//!
//! # Invariants
//!
//! - The log precedes every data-file write
//! - Sequence numbers start at 1 and increase by exactly 1
//! - Every record carries a checksum; a mismatch halts recovery
//! - Only an incomplete trailing record may be discarded

mod checksum;
mod errors;
mod reader;
mod record;
mod writer;

pub use checksum::{compute_checksum, verify_checksum};
pub use errors::{Severity, WalError, WalErrorCode, WalResult};
pub use reader::WalReader;
pub use record::{RecordType, WalPayload, WalRecord};
pub use writer::WalWriter;
