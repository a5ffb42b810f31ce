//! Startup recovery
//!
//! Recovery runs before the ledger accepts any request:
//!
//! 1. Scan the episode data file, rebuilding the index from its headers
//! 2. Truncate an incomplete trailing episode record
//! 3. Scan the WAL, truncating an incomplete trailing record
//! 4. Re-apply every WAL commit the data files do not hold
//! 5. Position the WAL writer after the highest known commit
//!
//! A checksum mismatch in any complete record halts recovery. Only a torn
//! tail, which is the expected result of a crash mid-append, is repaired.

use std::path::Path;

use tracing::{error, info, warn};

use crate::error::{LedgerError, LedgerResult, Operation, StorageFailure};
use crate::index::LedgerIndex;
use crate::model::EpisodeId;
use crate::mvcc::CommitId;
use crate::observability::Event;
use crate::storage::{EpisodeHeader, EpisodeScan, StorageError, StorageWriter, EPISODES_FILE};
use crate::wal::{WalError, WalReader, WalWriter};

/// What recovery found and repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Episodes indexed from the episode data file
    pub episodes_indexed: usize,
    /// WAL records read
    pub wal_records: usize,
    /// WAL commits re-applied to the data files
    pub wal_records_replayed: usize,
    /// An incomplete trailing WAL record was removed
    pub wal_tail_truncated: bool,
    /// An incomplete trailing episode record was removed
    pub data_tail_truncated: bool,
    /// Highest commit sequence present after recovery
    pub last_commit: u64,
}

/// Everything a freshly opened store needs.
pub(crate) struct Recovered {
    pub index: LedgerIndex,
    pub wal: WalWriter,
    pub storage: StorageWriter,
    pub report: RecoveryReport,
}

pub(crate) fn recover(data_dir: &Path) -> LedgerResult<Recovered> {
    info!(event = %Event::RecoveryBegin, data_dir = %data_dir.display(), "recovery started");

    let mut report = RecoveryReport::default();
    let mut index = LedgerIndex::new();

    // Creates the data files on first open.
    StorageWriter::open(data_dir).map_err(open_failed)?;

    rebuild_index(data_dir, &mut index, &mut report)?;
    info!(
        event = %Event::IndexRebuildComplete,
        episodes = report.episodes_indexed,
        last_commit = report.last_commit,
        "index rebuilt from episode data file"
    );

    let mut storage = StorageWriter::open(data_dir).map_err(open_failed)?;
    replay_wal(data_dir, &mut index, &mut storage, &mut report)?;
    info!(
        event = %Event::WalReplayComplete,
        wal_records = report.wal_records,
        replayed = report.wal_records_replayed,
        "WAL replay complete"
    );

    let mut wal = WalWriter::open(data_dir).map_err(open_failed)?;
    wal.resume_after(report.last_commit);

    Ok(Recovered {
        index,
        wal,
        storage,
        report,
    })
}

fn rebuild_index(
    data_dir: &Path,
    index: &mut LedgerIndex,
    report: &mut RecoveryReport,
) -> LedgerResult<()> {
    let mut scan = EpisodeScan::open(data_dir).map_err(open_failed)?;

    loop {
        match scan.read_next() {
            Ok(Some((offset, record))) => {
                let header = record.decode_header().map_err(|e| {
                    corrupt(StorageError::corruption_at_offset(
                        EPISODES_FILE,
                        offset,
                        format!("undecodable episode header: {}", e),
                    ))
                })?;
                let commit = CommitId::new(record.commit_sequence);
                let id = header.id.clone();
                if !index.insert(header.index_record(offset, commit)) {
                    return Err(corrupt(StorageError::corruption_at_offset(
                        EPISODES_FILE,
                        offset,
                        format!("episode '{}' stored twice", id),
                    )));
                }
                report.episodes_indexed += 1;
                report.last_commit = report.last_commit.max(record.commit_sequence);
            }
            Ok(None) => return Ok(()),
            Err(e) if e.is_torn_tail() => {
                let offset = e.offset().unwrap_or_else(|| scan.current_offset());
                warn!(
                    event = %Event::DataTailTruncated,
                    offset,
                    reason = %e,
                    "truncating incomplete trailing episode record"
                );
                StorageWriter::truncate_episodes(data_dir, offset).map_err(open_failed)?;
                report.data_tail_truncated = true;
                return Ok(());
            }
            Err(e) => return Err(corrupt(e)),
        }
    }
}

fn replay_wal(
    data_dir: &Path,
    index: &mut LedgerIndex,
    storage: &mut StorageWriter,
    report: &mut RecoveryReport,
) -> LedgerResult<()> {
    let wal_path = data_dir.join("wal").join("wal.log");
    if !wal_path.exists() {
        return Ok(());
    }

    let applied = report.last_commit;
    let mut reader = WalReader::open(&wal_path).map_err(open_failed)?;

    loop {
        match reader.read_next() {
            Ok(Some(record)) => {
                report.wal_records += 1;
                let sequence = record.sequence_number;
                report.last_commit = report.last_commit.max(sequence);
                if sequence <= applied {
                    continue;
                }

                let episode = record.payload.decode_episode().map_err(|e| {
                    wal_corrupt(WalError::corruption_at_sequence(
                        sequence,
                        format!("undecodable episode payload: {}", e),
                    ))
                })?;
                if index.contains(&episode.id) {
                    continue;
                }

                let offset = storage
                    .write_episode(&episode, sequence)
                    .map_err(|e| storage_failed(Some(&episode.id), e))?;
                let header = EpisodeHeader::new(&episode, Vec::new());
                index.insert(header.index_record(offset, CommitId::new(sequence)));
                report.wal_records_replayed += 1;
            }
            Ok(None) => return Ok(()),
            Err(e) if e.is_torn_tail() => {
                let offset = e.offset().unwrap_or_else(|| reader.current_offset());
                warn!(
                    event = %Event::WalTailTruncated,
                    offset,
                    reason = %e,
                    "truncating incomplete trailing WAL record"
                );
                WalWriter::truncate_tail(&wal_path, offset).map_err(open_failed)?;
                report.wal_tail_truncated = true;
                return Ok(());
            }
            Err(e) => return Err(wal_corrupt(e)),
        }
    }
}

fn open_failed(e: impl Into<StorageFailure>) -> LedgerError {
    LedgerError::storage(Operation::Open, None, e)
}

fn storage_failed(id: Option<&EpisodeId>, e: StorageError) -> LedgerError {
    LedgerError::storage(Operation::Open, id, e)
}

fn corrupt(e: StorageError) -> LedgerError {
    error!(event = %Event::CorruptionDetected, error = %e, "episode data file is corrupt");
    LedgerError::storage(Operation::Open, None, e)
}

fn wal_corrupt(e: WalError) -> LedgerError {
    error!(event = %Event::CorruptionDetected, error = %e, "WAL is corrupt");
    LedgerError::storage(Operation::Open, None, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EpisodeDraft, EpisodeStatus, Step};
    use crate::wal::WalPayload;
    use chrono::Utc;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn episode(id: &str) -> crate::model::Episode {
        EpisodeDraft::new("a1", EpisodeStatus::Success)
            .with_step(Step::llm_call(0, "gpt-4", Some("openai")).with_tokens(10))
            .into_episode(EpisodeId::new(id), Utc::now())
    }

    #[test]
    fn test_fresh_directory_recovers_empty() {
        let temp = TempDir::new().unwrap();
        let recovered = recover(temp.path()).unwrap();
        assert!(recovered.index.is_empty());
        assert_eq!(recovered.report, RecoveryReport::default());
        assert_eq!(recovered.wal.next_sequence_number(), 1);
    }

    #[test]
    fn test_wal_commit_missing_from_data_is_replayed() {
        let temp = TempDir::new().unwrap();
        {
            let mut wal = WalWriter::open(temp.path()).unwrap();
            wal.append(WalPayload::from_episode(&episode("e1")).unwrap()).unwrap();
        }

        let recovered = recover(temp.path()).unwrap();
        assert!(recovered.index.contains(&EpisodeId::new("e1")));
        assert_eq!(recovered.report.wal_records_replayed, 1);
        assert_eq!(recovered.wal.next_sequence_number(), 2);

        drop(recovered);
        let again = recover(temp.path()).unwrap();
        assert_eq!(again.report.episodes_indexed, 1);
        assert_eq!(again.report.wal_records_replayed, 0);
    }

    #[test]
    fn test_torn_wal_tail_is_truncated() {
        let temp = TempDir::new().unwrap();
        let wal_path = temp.path().join("wal").join("wal.log");
        {
            let mut wal = WalWriter::open(temp.path()).unwrap();
            wal.append(WalPayload::from_episode(&episode("e1")).unwrap()).unwrap();
        }
        let good_len = std::fs::metadata(&wal_path).unwrap().len();
        OpenOptions::new()
            .append(true)
            .open(&wal_path)
            .unwrap()
            .write_all(&[0xFF; 7])
            .unwrap();

        let recovered = recover(temp.path()).unwrap();
        assert!(recovered.report.wal_tail_truncated);
        assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), good_len);
        assert_eq!(recovered.index.len(), 1);
    }

    #[test]
    fn test_corrupt_episode_record_is_fatal() {
        let temp = TempDir::new().unwrap();
        {
            let mut storage = StorageWriter::open(temp.path()).unwrap();
            storage.write_episode(&episode("e1"), 1).unwrap();
        }
        let path = temp.path().join("data").join(EPISODES_FILE);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[12] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let err = recover(temp.path()).err().unwrap();
        assert!(err.is_fatal());
        assert_eq!(err.operation(), Operation::Open);
    }
}
