//! In-memory episode indexes
//!
//! Indexes are derived state: they are rebuilt from the episode data file
//! at open and updated after every commit.
//!
//! # Design Principles
//!
//! - BTree structures only, so iteration order is deterministic
//! - Index entries point back to episode records by byte offset
//! - Filtering never needs to read a step
//!
//! # Invariants
//!
//! - The primary index is ordered by `created_at`, then `id`
//! - Every secondary posting set is ordered the same way
//! - An episode appears in the indexes only after its commit is durable

mod key;
mod manager;
mod secondary;

pub use key::{EpisodeKey, IndexEntry, IndexRecord};
pub use manager::LedgerIndex;
pub use secondary::{IndexField, SecondaryIndex};
