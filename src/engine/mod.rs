//! Storage engine for the episode ledger
//!
//! # Design Principles
//!
//! - The WAL is written and fsynced before either data file
//! - An episode becomes visible only after every write is durable
//! - Exactly one writer; any number of concurrent readers
//! - Readers never observe a partially written episode
//!
//! # Invariants
//!
//! - Episodes are never modified or deleted once committed
//! - Ids are unique across the ledger
//! - Recovery completes before the first request is served

mod recovery;
mod store;
mod stream;

pub use recovery::RecoveryReport;
pub use store::EpisodeStore;
pub use stream::EpisodeStream;
