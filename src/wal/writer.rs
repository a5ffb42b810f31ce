//! WAL writer with fsync enforcement
//!
//! - Every append is followed by fsync
//! - No batching, no group commit
//! - The sequence number advances only after a successful fsync
//!
//! Acknowledgment before fsync is forbidden.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::errors::{WalError, WalResult};
use super::reader::WalReader;
use super::record::{RecordType, WalPayload, WalRecord};

/// Append-only WAL writer. Exactly one exists per open ledger.
pub struct WalWriter {
    wal_path: PathBuf,
    file: File,
    /// Next sequence number to assign (starts at 1, never reused)
    next_sequence: u64,
}

impl WalWriter {
    /// Opens or creates `<data_dir>/wal/wal.log`.
    ///
    /// # Errors
    ///
    /// Returns `LEDGER_WAL_APPEND_FAILED` if the file cannot be created or
    /// opened, or the read error if the existing log is damaged.
    pub fn open(data_dir: &Path) -> WalResult<Self> {
        let wal_dir = data_dir.join("wal");
        let wal_path = wal_dir.join("wal.log");

        fs::create_dir_all(&wal_dir).map_err(|e| {
            WalError::append_failed(
                format!("Failed to create WAL directory: {}", wal_dir.display()),
                e,
            )
        })?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&wal_path)
            .map_err(|e| {
                WalError::append_failed(
                    format!("Failed to open WAL file: {}", wal_path.display()),
                    e,
                )
            })?;

        let next_sequence = Self::determine_next_sequence(&wal_path)?;

        Ok(Self {
            wal_path,
            file,
            next_sequence,
        })
    }

    /// Scans the existing log for its highest sequence number.
    ///
    /// Returns 1 if the log is empty.
    fn determine_next_sequence(wal_path: &Path) -> WalResult<u64> {
        let metadata = match fs::metadata(wal_path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(1),
            Err(e) => return Err(WalError::append_failed("Failed to read WAL metadata", e)),
        };
        if metadata.len() == 0 {
            return Ok(1);
        }

        let mut reader = WalReader::open(wal_path)?;
        let mut max_sequence = 0u64;
        while let Some(record) = reader.read_next()? {
            max_sequence = max_sequence.max(record.sequence_number);
        }
        Ok(max_sequence + 1)
    }

    /// Cuts the log back to `offset`, discarding an incomplete trailing record.
    pub fn truncate_tail(wal_path: &Path, offset: u64) -> WalResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(wal_path)
            .map_err(|e| WalError::append_failed("Failed to open WAL for truncation", e))?;
        file.set_len(offset)
            .map_err(|e| WalError::append_failed("Failed to truncate WAL", e))?;
        file.sync_all()
            .map_err(|e| WalError::fsync_failed("fsync failed after WAL truncation", e))
    }

    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    pub fn next_sequence_number(&self) -> u64 {
        self.next_sequence
    }

    /// Ensures future sequence numbers are above `floor`.
    ///
    /// Data files may reference commits the log no longer holds; new
    /// commits must still sort after them.
    pub fn resume_after(&mut self, floor: u64) {
        self.next_sequence = self.next_sequence.max(floor + 1);
    }

    /// Appends a commit record and fsyncs it.
    ///
    /// # Returns
    ///
    /// The sequence number assigned to the record.
    ///
    /// # Errors
    ///
    /// - `LEDGER_WAL_APPEND_FAILED` if the write fails
    /// - `LEDGER_WAL_FSYNC_FAILED` if fsync fails (FATAL)
    pub fn append(&mut self, payload: WalPayload) -> WalResult<u64> {
        let sequence_number = self.next_sequence;
        let record = WalRecord::new(RecordType::EpisodeCommit, sequence_number, payload);
        let serialized = record.serialize();
        let start = self
            .file
            .metadata()
            .map_err(|e| WalError::append_failed("Failed to read WAL metadata", e))?
            .len();

        if let Err(e) = self.file.write_all(&serialized) {
            // A partial record left behind would read as mid-log corruption
            // once the next append lands after it.
            if let Err(rollback) = self.file.set_len(start) {
                return Err(WalError::fsync_failed(
                    format!(
                        "Failed to roll back partial WAL record at sequence {}: {}",
                        sequence_number, e
                    ),
                    rollback,
                ));
            }
            return Err(WalError::append_failed(
                format!("Failed to write WAL record at sequence {}", sequence_number),
                e,
            ));
        }

        self.file.sync_all().map_err(|e| {
            WalError::fsync_failed(
                format!("fsync failed after WAL append at sequence {}", sequence_number),
                e,
            )
        })?;

        self.next_sequence += 1;
        Ok(sequence_number)
    }

    /// Explicitly fsyncs the log.
    pub fn fsync(&self) -> WalResult<()> {
        self.file
            .sync_all()
            .map_err(|e| WalError::fsync_failed("Explicit WAL fsync failed", e))
    }
}
