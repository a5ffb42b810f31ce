//! The episode store
//!
//! Owns the single writer and the shared index. Writes serialize on the
//! writer mutex; reads take the index lock only long enough to resolve
//! offsets under a `ReadView`, then read the data files through their own
//! handles.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::recovery::{self, RecoveryReport};
use super::stream::EpisodeStream;
use crate::diff::{diff_episodes, EpisodeDiff};
use crate::error::{LedgerError, LedgerResult, Operation, StorageFailure};
use crate::index::{IndexEntry, LedgerIndex};
use crate::model::{Episode, EpisodeDraft, EpisodeId, EpisodeSummary};
use crate::mvcc::CommitId;
use crate::observability::Event;
use crate::query::{self, ListFilter};
use crate::replay::{to_replay, ReplayView};
use crate::schema::validate_draft;
use crate::storage::{EpisodeHeader, StorageReader, StorageWriter};
use crate::wal::{WalError, WalPayload, WalWriter};

struct WriterState {
    wal: WalWriter,
    storage: StorageWriter,
    /// Set once a failure leaves the data files behind the WAL
    halted: Option<String>,
}

/// Durable, append-only store of episodes.
pub struct EpisodeStore {
    data_dir: PathBuf,
    index: RwLock<LedgerIndex>,
    writer: Mutex<WriterState>,
    recovery: RecoveryReport,
}

impl EpisodeStore {
    /// Opens the ledger rooted at `data_dir`, creating it if needed.
    ///
    /// Recovery completes before this returns.
    pub fn open(data_dir: impl AsRef<Path>) -> LedgerResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        info!(event = %Event::LedgerOpenBegin, data_dir = %data_dir.display(), "opening ledger");

        let recovered = recovery::recover(&data_dir)?;
        info!(
            event = %Event::LedgerOpenComplete,
            episodes = recovered.index.len(),
            last_commit = recovered.report.last_commit,
            "ledger open"
        );

        Ok(Self {
            data_dir,
            index: RwLock::new(recovered.index),
            writer: Mutex::new(WriterState {
                wal: recovered.wal,
                storage: recovered.storage,
                halted: None,
            }),
            recovery: recovered.report,
        })
    }

    /// What recovery found when this store was opened.
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Number of stored episodes.
    pub fn count(&self) -> usize {
        self.read_index().len()
    }

    /// Persists a validated draft.
    ///
    /// Assigns an id and `created_at` when absent. The episode is visible to
    /// readers only once the WAL record and both data files are fsynced.
    ///
    /// # Errors
    ///
    /// - `Validation` if the draft breaks a step invariant
    /// - `Conflict` if the id is already stored; nothing is written
    /// - `Storage` on any write or fsync failure
    pub fn put(&self, draft: EpisodeDraft) -> LedgerResult<Episode> {
        if let Err(e) = validate_draft(&draft) {
            warn!(event = %Event::EpisodeRejected, reason = %e, "episode rejected");
            return Err(LedgerError::validation(Operation::Ingest, e));
        }

        let mut writer = self.lock_writer();
        if let Some(reason) = &writer.halted {
            return Err(LedgerError::storage(
                Operation::Ingest,
                draft.id.as_ref(),
                StorageFailure::Halted(reason.clone()),
            ));
        }

        let id = draft.id.clone().unwrap_or_else(EpisodeId::generate);
        if self.read_index().contains(&id) {
            warn!(event = %Event::EpisodeRejected, episode_id = %id, "duplicate episode id");
            return Err(LedgerError::conflict(Operation::Ingest, id));
        }

        let created_at = draft.created_at.unwrap_or_else(Utc::now);
        let episode = draft.into_episode(id, created_at);

        let payload = WalPayload::from_episode(&episode).map_err(|e| {
            LedgerError::storage(
                Operation::Ingest,
                Some(&episode.id),
                WalError::append_failed(
                    "Failed to encode episode",
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                ),
            )
        })?;

        let sequence = match writer.wal.append(payload) {
            Ok(sequence) => sequence,
            Err(e) => {
                // A rolled-back append left nothing behind; anything else
                // may have.
                if e.is_fatal() {
                    halt(&mut writer, &episode.id, &e.to_string());
                }
                return Err(LedgerError::storage(Operation::Ingest, Some(&episode.id), e));
            }
        };

        let offset = match writer.storage.write_episode(&episode, sequence) {
            Ok(offset) => offset,
            Err(e) => {
                halt(&mut writer, &episode.id, &e.to_string());
                return Err(LedgerError::storage(Operation::Ingest, Some(&episode.id), e));
            }
        };

        let record = EpisodeHeader::new(&episode, Vec::new()).index_record(offset, CommitId::new(sequence));
        self.write_index().insert(record);
        drop(writer);

        info!(
            event = %Event::EpisodeCommitted,
            episode_id = %episode.id,
            agent_id = %episode.agent_id,
            steps = episode.steps.len(),
            commit = sequence,
            "episode committed"
        );
        Ok(episode)
    }

    /// Fetches a full episode.
    pub fn get(&self, id: &EpisodeId) -> LedgerResult<Episode> {
        self.get_for(Operation::Get, id)
    }

    /// Fetches a full episode, attributing failures to `operation`.
    pub fn get_for(&self, operation: Operation, id: &EpisodeId) -> LedgerResult<Episode> {
        let entry = {
            let index = self.read_index();
            let view = index.read_view();
            index.locate(id, view).map(|(_, entry)| entry)
        };
        let entry = entry.ok_or_else(|| LedgerError::not_found(operation, id.clone()))?;

        self.open_reader(operation)?
            .read_episode_at(entry.offset)
            .map_err(|e| LedgerError::storage(operation, Some(id), e))
    }

    /// Replay view of a stored episode.
    pub fn replay(&self, id: &EpisodeId) -> LedgerResult<ReplayView> {
        self.get_for(Operation::Replay, id).map(|episode| to_replay(&episode))
    }

    /// Positional diff of two stored episodes.
    ///
    /// If both are missing, the left id is reported.
    pub fn diff(&self, left: &EpisodeId, right: &EpisodeId) -> LedgerResult<EpisodeDiff> {
        let left = self.get_for(Operation::Diff, left)?;
        let right = self.get_for(Operation::Diff, right)?;
        Ok(diff_episodes(&left, &right))
    }

    /// Lists episode summaries matching `filter`, in `created_at` then id order.
    pub fn list(&self, filter: &ListFilter) -> LedgerResult<Vec<EpisodeSummary>> {
        let entries = self.plan(filter);
        let mut reader = self.open_reader(Operation::List)?;
        entries
            .into_iter()
            .map(|(id, entry)| {
                reader
                    .read_header_at(entry.offset)
                    .map(|(_, header)| header.summary())
                    .map_err(|e| LedgerError::storage(Operation::List, Some(&id), e))
            })
            .collect()
    }

    /// Like [`list`](Self::list), returning full episodes.
    pub fn list_full(&self, filter: &ListFilter) -> LedgerResult<Vec<Episode>> {
        let entries = self.plan(filter);
        let mut reader = self.open_reader(Operation::List)?;
        entries
            .into_iter()
            .map(|(id, entry)| {
                reader
                    .read_episode_at(entry.offset)
                    .map_err(|e| LedgerError::storage(Operation::List, Some(&id), e))
            })
            .collect()
    }

    /// Lazily walks every episode committed before this call, in order.
    pub fn stream_all(&self) -> LedgerResult<EpisodeStream<'_>> {
        self.stream_for(Operation::Stream, None)
    }

    /// Lazily walks the episodes matching `filter`, ignoring its offset and
    /// limit.
    pub fn stream_matching(&self, filter: &ListFilter) -> LedgerResult<EpisodeStream<'_>> {
        self.stream_for(Operation::Stream, Some(filter))
    }

    /// Opens a snapshot stream, attributing failures to `operation`.
    pub fn stream_for(
        &self,
        operation: Operation,
        filter: Option<&ListFilter>,
    ) -> LedgerResult<EpisodeStream<'_>> {
        let reader = self.open_reader(operation)?;
        let index = self.read_index();
        let view = index.read_view();

        match filter {
            None => Ok(EpisodeStream::all(self, reader, view, operation)),
            Some(filter) => {
                let unpaged = ListFilter {
                    offset: 0,
                    limit: None,
                    ..filter.clone()
                };
                let matches = query::plan(&index, &unpaged, view).matches;
                drop(index);
                Ok(EpisodeStream::planned(self, reader, view, operation, matches))
            }
        }
    }

    /// Fsyncs the WAL and both data files.
    pub fn close(self) -> LedgerResult<()> {
        let writer = self
            .writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        writer
            .wal
            .fsync()
            .map_err(|e| LedgerError::storage(Operation::Open, None, e))?;
        writer
            .storage
            .sync()
            .map_err(|e| LedgerError::storage(Operation::Open, None, e))?;
        info!(event = %Event::LedgerClosed, "ledger closed");
        Ok(())
    }

    pub(crate) fn read_index(&self) -> RwLockReadGuard<'_, LedgerIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, LedgerIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn open_reader(&self, operation: Operation) -> LedgerResult<StorageReader> {
        StorageReader::open(&self.data_dir).map_err(|e| LedgerError::storage(operation, None, e))
    }

    fn plan(&self, filter: &ListFilter) -> Vec<(EpisodeId, IndexEntry)> {
        let index = self.read_index();
        let view = index.read_view();
        let plan = query::plan(&index, filter, view);
        debug!(
            scan = plan.scan_type.as_str(),
            driver = plan.driver.map(|f| f.as_str()).unwrap_or("primary"),
            candidates = plan.candidates,
            matched = plan.matches.len(),
            "list planned"
        );
        plan.matches
            .into_iter()
            .map(|(key, entry)| (key.id, entry))
            .collect()
    }
}

fn halt(writer: &mut WriterState, id: &EpisodeId, reason: &str) {
    error!(
        event = %Event::LedgerHalted,
        episode_id = %id,
        reason,
        "write failed after WAL append, refusing further writes"
    );
    writer.halted = Some(reason.to_string());
}
