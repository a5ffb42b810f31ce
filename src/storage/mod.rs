//! Episode and step data files
//!
//! Two append-only record files hold the canonical state:
//!
//! - `data/steps.dat`: one record per step, keyed by episode id and `step_index`
//! - `data/episodes.dat`: one record per episode, pointing at its step records
//!
//! # Design Principles
//!
//! - Append-only, no in-place updates
//! - Checksum-verified on every read
//! - Written only after the WAL record is durable
//!
//! # Invariants
//!
//! - An episode record is written after all of its step records, so its
//!   presence means the whole episode is on disk
//! - A record with a bad checksum is never returned
//! - Only an incomplete trailing episode record may be discarded

mod errors;
mod reader;
mod record;
mod writer;

pub use errors::{StorageError, StorageErrorCode, StorageResult};
pub use reader::{EpisodeScan, StorageReader};
pub use record::{EpisodeHeader, EpisodeRecord, StepRecord};
pub use writer::StorageWriter;

/// File name of the episode data file under `<data_dir>/data`
pub const EPISODES_FILE: &str = "episodes.dat";
/// File name of the step data file under `<data_dir>/data`
pub const STEPS_FILE: &str = "steps.dat";
