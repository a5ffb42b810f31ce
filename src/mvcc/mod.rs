//! Snapshot visibility primitives
//!
//! Every committed episode is tagged with the WAL sequence number of its
//! commit record. A reader captures the highest published commit when it
//! starts and ignores anything committed after it.
//!
//! # Invariants
//!
//! - Commit identities are totally ordered and never reused
//! - A read view never changes once established
//! - A reader never observes an episode committed after its view

mod commit_id;
mod read_view;

pub use commit_id::CommitId;
pub use read_view::ReadView;
