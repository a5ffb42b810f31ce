//! Positional episode diff
//!
//! Steps are paired by position after each side is ordered by
//! `step_index`. The comparison is structural only:
//!
//! - Compared fields: `step_type`, `model`, `provider`, `tool_name`, `tokens`
//! - Positions past the shorter side are `added` (right only) or
//!   `removed` (left only)
//! - Summary counts add up to the longer side's step count
//!
//! No alignment or edit-distance matching is attempted.

mod engine;

pub use engine::{diff_episodes, Change, DiffSummary, EpisodeDiff, FieldChange, StepDiff, StepFields};
