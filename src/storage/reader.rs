//! Storage readers
//!
//! `StorageReader` serves random-access reads by offset; every reader owns
//! its own file handles, so concurrent readers never share a cursor.
//! `EpisodeScan` walks the episode data file sequentially for index
//! rebuild and verification.
//!
//! Every read validates the record checksum.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::errors::{StorageError, StorageResult};
use super::record::{EpisodeHeader, EpisodeRecord, StepRecord, FRAME_OVERHEAD};
use super::{EPISODES_FILE, STEPS_FILE};
use crate::model::{Episode, Step};

/// Random-access reader over both data files.
pub struct StorageReader {
    episodes: File,
    steps: File,
}

impl StorageReader {
    /// Opens both data files under `<data_dir>/data` for reading.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        let dir = data_dir.join("data");
        Ok(Self {
            episodes: open_read(&dir.join(EPISODES_FILE))?,
            steps: open_read(&dir.join(STEPS_FILE))?,
        })
    }

    /// Reads the episode header stored at `offset`.
    ///
    /// Returns the commit sequence and the decoded header.
    pub fn read_header_at(&mut self, offset: u64) -> StorageResult<(u64, EpisodeHeader)> {
        let bytes = read_frame_at(&mut self.episodes, offset, EPISODES_FILE)?;
        let record = EpisodeRecord::deserialize(&bytes)
            .map_err(|e| StorageError::corruption_at_offset(EPISODES_FILE, offset, e.to_string()))?;
        let header = record.decode_header().map_err(|e| {
            StorageError::corruption_at_offset(
                EPISODES_FILE,
                offset,
                format!("undecodable episode header: {}", e),
            )
        })?;
        Ok((record.commit_sequence, header))
    }

    /// Reads the step stored at `offset`.
    pub fn read_step_at(&mut self, offset: u64) -> StorageResult<StepRecord> {
        let bytes = read_frame_at(&mut self.steps, offset, STEPS_FILE)?;
        StepRecord::deserialize(&bytes)
            .map_err(|e| StorageError::corruption_at_offset(STEPS_FILE, offset, e.to_string()))
    }

    /// Reads a full episode: its header, then every step it references.
    pub fn read_episode_at(&mut self, offset: u64) -> StorageResult<Episode> {
        let (_, header) = self.read_header_at(offset)?;
        let mut steps: Vec<Step> = Vec::with_capacity(header.step_offsets.len());

        for &step_offset in &header.step_offsets {
            let record = self.read_step_at(step_offset)?;
            if record.episode_id != header.id.as_str() {
                return Err(StorageError::corruption_at_offset(
                    STEPS_FILE,
                    step_offset,
                    format!(
                        "step belongs to episode '{}', expected '{}'",
                        record.episode_id, header.id
                    ),
                ));
            }
            let step = record.decode_step().map_err(|e| {
                StorageError::corruption_at_offset(
                    STEPS_FILE,
                    step_offset,
                    format!("undecodable step: {}", e),
                )
            })?;
            steps.push(step);
        }

        Ok(header.into_episode(steps))
    }
}

/// Sequential scan of the episode data file.
pub struct EpisodeScan {
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
}

impl EpisodeScan {
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        let file = open_read(&data_dir.join("data").join(EPISODES_FILE))?;
        let file_size = file
            .metadata()
            .map_err(|e| StorageError::read_failed("Failed to read file metadata", e))?
            .len();
        Ok(Self {
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        })
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Reads the next episode record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((offset, record)))` for a verified record
    /// - `Ok(None)` at a clean end of file
    /// - `Err` with code `TornTail` if the last record is incomplete
    /// - `Err` with code `Corruption` for a damaged complete record
    pub fn read_next(&mut self) -> StorageResult<Option<(u64, EpisodeRecord)>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }
        let offset = self.current_offset;
        let remaining = self.file_size - offset;

        if remaining < FRAME_OVERHEAD {
            return Err(StorageError::torn_tail(
                EPISODES_FILE,
                offset,
                format!("{} trailing bytes", remaining),
            ));
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            StorageError::read_failed(format!("Failed to read record length at {}", offset), e)
        })?;
        let length = u32::from_le_bytes(len_buf) as u64;

        if length < FRAME_OVERHEAD {
            return Err(StorageError::corruption_at_offset(
                EPISODES_FILE,
                offset,
                format!("Invalid record length: {}", length),
            ));
        }
        if length > remaining {
            return Err(StorageError::torn_tail(
                EPISODES_FILE,
                offset,
                format!("Record length {} exceeds remaining {}", length, remaining),
            ));
        }

        let mut buf = vec![0u8; length as usize];
        buf[0..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut buf[4..]).map_err(|e| {
            StorageError::read_failed(format!("Failed to read record body at {}", offset), e)
        })?;

        let record = EpisodeRecord::deserialize(&buf)
            .map_err(|e| StorageError::corruption_at_offset(EPISODES_FILE, offset, e.to_string()))?;

        self.current_offset += length;
        Ok(Some((offset, record)))
    }
}

fn open_read(path: &Path) -> StorageResult<File> {
    File::open(path).map_err(|e| {
        StorageError::read_failed(format!("Failed to open data file: {}", path.display()), e)
    })
}

/// Reads one complete frame at `offset`.
///
/// Offsets come from committed index entries, so a short read here is
/// corruption rather than a torn tail.
fn read_frame_at(file: &mut File, offset: u64, name: &str) -> StorageResult<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| StorageError::read_failed(format!("Failed to seek {} to {}", name, offset), e))?;

    let mut len_buf = [0u8; 4];
    read_exact_or_corrupt(file, &mut len_buf, name, offset)?;
    let length = u32::from_le_bytes(len_buf) as u64;
    if length < FRAME_OVERHEAD {
        return Err(StorageError::corruption_at_offset(
            name,
            offset,
            format!("Invalid record length: {}", length),
        ));
    }

    let mut buf = vec![0u8; length as usize];
    buf[0..4].copy_from_slice(&len_buf);
    read_exact_or_corrupt(file, &mut buf[4..], name, offset)?;
    Ok(buf)
}

fn read_exact_or_corrupt(file: &mut File, buf: &mut [u8], name: &str, offset: u64) -> StorageResult<()> {
    file.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            StorageError::corruption_at_offset(name, offset, "record extends past end of file")
        } else {
            StorageError::read_failed(format!("Failed to read {} at {}", name, offset), e)
        }
    })
}
