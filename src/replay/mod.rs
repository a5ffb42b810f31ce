//! Replay transformer
//!
//! Produces a deterministic re-execution view of an episode: steps are
//! renumbered `0..n-1` in their stored order and wall-clock timestamps are
//! dropped. Every other step field passes through unchanged.
//!
//! The transform is pure and idempotent: replaying a replay yields the
//! same steps.

mod transform;

pub use transform::{to_replay, ReplayStep, ReplayView};
