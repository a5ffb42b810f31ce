//! Episode and step data model
//!
//! An episode is one recorded agent task execution. It owns an ordered
//! sequence of steps and is immutable once accepted by the ledger.
//!
//! # Design Principles
//!
//! - Conditional step fields are optional on every step type
//! - Identity (`id`, `created_at`) is assigned exactly once, at ingest
//! - Aggregates are derived from steps, never stored as input
//!
//! # Invariants
//!
//! - Steps of a stored episode are sorted by `step_index` ascending
//! - `step_index` values are unique within an episode

mod episode;
mod step;
mod totals;

pub use episode::{Episode, EpisodeDocument, EpisodeDraft, EpisodeId, EpisodeStatus, EpisodeSummary};
pub use step::{Step, StepKind};
pub use totals::{round_cost, Totals, TotalsOverflow};
