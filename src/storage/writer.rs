//! Storage writer with fsync enforcement
//!
//! - Data files are written only after the WAL record is fsynced
//! - Step records go first, the episode record last
//! - A failed write leaves the WAL as the source of truth; recovery
//!   reapplies it at the next open

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use super::errors::{StorageError, StorageResult};
use super::record::{EpisodeHeader, EpisodeRecord, StepRecord};
use super::{EPISODES_FILE, STEPS_FILE};
use crate::model::Episode;

/// Append-only writer over both data files.
pub struct StorageWriter {
    episodes: File,
    steps: File,
    episodes_len: u64,
    steps_len: u64,
}

impl StorageWriter {
    /// Opens or creates both data files under `<data_dir>/data`.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        let dir = data_dir.join("data");
        fs::create_dir_all(&dir).map_err(|e| {
            StorageError::write_failed(
                format!("Failed to create data directory: {}", dir.display()),
                e,
            )
        })?;

        let (episodes, episodes_len) = open_append(&dir.join(EPISODES_FILE))?;
        let (steps, steps_len) = open_append(&dir.join(STEPS_FILE))?;

        Ok(Self {
            episodes,
            steps,
            episodes_len,
            steps_len,
        })
    }

    /// Cuts the episode data file back to `offset`.
    pub fn truncate_episodes(data_dir: &Path, offset: u64) -> StorageResult<()> {
        let path = data_dir.join("data").join(EPISODES_FILE);
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| StorageError::write_failed("Failed to open episode file for truncation", e))?;
        file.set_len(offset)
            .map_err(|e| StorageError::write_failed("Failed to truncate episode file", e))?;
        file.sync_all()
            .map_err(|e| StorageError::write_failed("fsync failed after truncation", e))
    }

    pub fn episodes_len(&self) -> u64 {
        self.episodes_len
    }

    /// Writes an episode: all step records, then the episode record.
    ///
    /// # Returns
    ///
    /// The byte offset of the episode record.
    ///
    /// # Errors
    ///
    /// Returns `LEDGER_STORAGE_WRITE_FAILED` if a write or fsync fails.
    pub fn write_episode(&mut self, episode: &Episode, commit_sequence: u64) -> StorageResult<u64> {
        let mut step_bytes = Vec::new();
        let mut step_offsets = Vec::with_capacity(episode.steps.len());

        for step in &episode.steps {
            let record = StepRecord::from_step(&episode.id, step).map_err(|e| {
                encode_failed(format!("step {} of episode {}", step.step_index, episode.id), e)
            })?;
            step_offsets.push(self.steps_len + step_bytes.len() as u64);
            step_bytes.extend_from_slice(&record.serialize());
        }

        if !step_bytes.is_empty() {
            self.steps.write_all(&step_bytes).map_err(|e| {
                StorageError::write_failed(format!("Failed to write steps of episode {}", episode.id), e)
            })?;
            self.steps.sync_all().map_err(|e| {
                StorageError::write_failed(
                    format!("fsync failed after writing steps of episode {}", episode.id),
                    e,
                )
            })?;
            self.steps_len += step_bytes.len() as u64;
        }

        let header = EpisodeHeader::new(episode, step_offsets);
        let record = EpisodeRecord::new(commit_sequence, &header)
            .map_err(|e| encode_failed(format!("episode {}", episode.id), e))?;
        let bytes = record.serialize();
        let offset = self.episodes_len;

        self.episodes.write_all(&bytes).map_err(|e| {
            StorageError::write_failed(format!("Failed to write episode {}", episode.id), e)
        })?;
        self.episodes.sync_all().map_err(|e| {
            StorageError::write_failed(
                format!("fsync failed after writing episode {}", episode.id),
                e,
            )
        })?;
        self.episodes_len += bytes.len() as u64;

        Ok(offset)
    }

    /// Fsyncs both data files.
    pub fn sync(&self) -> StorageResult<()> {
        self.steps
            .sync_all()
            .and_then(|_| self.episodes.sync_all())
            .map_err(|e| StorageError::write_failed("Explicit data file fsync failed", e))
    }
}

fn open_append(path: &Path) -> StorageResult<(File, u64)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            StorageError::write_failed(format!("Failed to open data file: {}", path.display()), e)
        })?;
    let len = file
        .metadata()
        .map_err(|e| StorageError::write_failed("Failed to read file metadata", e))?
        .len();
    Ok((file, len))
}

fn encode_failed(what: String, e: serde_json::Error) -> StorageError {
    StorageError::write_failed(
        format!("Failed to encode {}", what),
        io::Error::new(io::ErrorKind::InvalidData, e),
    )
}
