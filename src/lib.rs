//! episode-ledger - An append-only, replayable ledger of agent task episodes
//!
//! Episodes are validated, committed through a write-ahead log, indexed
//! for filtered listing, and served back as stored, as replay views, as
//! positional diffs and as NDJSON exports.

pub mod cli;
pub mod diff;
pub mod engine;
pub mod error;
pub mod export;
pub mod http_server;
pub mod index;
pub mod model;
pub mod mvcc;
pub mod observability;
pub mod query;
pub mod replay;
pub mod schema;
pub mod storage;
pub mod wal;

pub use engine::EpisodeStore;
pub use error::{LedgerError, LedgerResult, Operation};
