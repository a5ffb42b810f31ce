//! Query engine for listing episodes
//!
//! # Design Principles
//!
//! - Filters are a conjunction of exact matches plus inclusive time bounds
//! - Secondary indexes answer equality filters; the data files are read
//!   only for matches
//! - Results are always ordered by `created_at`, then `id`
//!
//! Fetching a single episode by id is `EpisodeStore::get`.

mod filter;
mod planner;

pub use filter::ListFilter;
pub use planner::{plan, QueryPlan, ScanType};
