//! Snapshot streaming over the ledger
//!
//! The stream captures a `ReadView` when created. An unfiltered stream
//! takes the index read lock just long enough to find the next visible key
//! on each step, so writers are never blocked for the length of a stream.
//! A filtered stream resolves its matching keys once, up front. Either way
//! episodes committed after the stream opened never appear in it, and
//! episode bodies are read one at a time.

use std::vec;

use crate::error::{LedgerError, LedgerResult, Operation};
use crate::index::{EpisodeKey, IndexEntry};
use crate::model::Episode;
use crate::mvcc::ReadView;
use crate::storage::StorageReader;

use super::store::EpisodeStore;

enum Source {
    /// Walk the primary index from just after the last key returned
    Cursor(Option<EpisodeKey>),
    /// Keys already resolved by the planner
    Planned(vec::IntoIter<(EpisodeKey, IndexEntry)>),
}

/// Lazy, ordered iterator over a consistent snapshot of the ledger.
pub struct EpisodeStream<'a> {
    store: &'a EpisodeStore,
    reader: StorageReader,
    view: ReadView,
    source: Source,
    operation: Operation,
    done: bool,
}

impl<'a> EpisodeStream<'a> {
    pub(crate) fn all(
        store: &'a EpisodeStore,
        reader: StorageReader,
        view: ReadView,
        operation: Operation,
    ) -> Self {
        Self::with_source(store, reader, view, operation, Source::Cursor(None))
    }

    pub(crate) fn planned(
        store: &'a EpisodeStore,
        reader: StorageReader,
        view: ReadView,
        operation: Operation,
        matches: Vec<(EpisodeKey, IndexEntry)>,
    ) -> Self {
        Self::with_source(
            store,
            reader,
            view,
            operation,
            Source::Planned(matches.into_iter()),
        )
    }

    fn with_source(
        store: &'a EpisodeStore,
        reader: StorageReader,
        view: ReadView,
        operation: Operation,
        source: Source,
    ) -> Self {
        Self {
            store,
            reader,
            view,
            source,
            operation,
            done: false,
        }
    }

    /// The snapshot boundary this stream reads at.
    pub fn view(&self) -> ReadView {
        self.view
    }

    fn next_entry(&mut self) -> Option<(EpisodeKey, IndexEntry)> {
        match &mut self.source {
            Source::Cursor(cursor) => {
                let next = self
                    .store
                    .read_index()
                    .next_after(cursor.as_ref(), self.view)?;
                *cursor = Some(next.0.clone());
                Some(next)
            }
            Source::Planned(matches) => matches.next(),
        }
    }
}

impl Iterator for EpisodeStream<'_> {
    type Item = LedgerResult<Episode>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some((key, entry)) = self.next_entry() else {
            self.done = true;
            return None;
        };

        let result = self
            .reader
            .read_episode_at(entry.offset)
            .map_err(|e| LedgerError::storage(self.operation, Some(&key.id), e));
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::EpisodeStore;
    use crate::model::{EpisodeDraft, EpisodeStatus, Step};
    use crate::query::ListFilter;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn seeded() -> (TempDir, EpisodeStore) {
        let temp = TempDir::new().unwrap();
        let store = EpisodeStore::open(temp.path()).unwrap();
        for (id, secs, status) in [
            ("b", 20, EpisodeStatus::Failure),
            ("a", 10, EpisodeStatus::Success),
            ("c", 30, EpisodeStatus::Failure),
        ] {
            store
                .put(
                    EpisodeDraft::new("a1", status)
                        .with_id(id)
                        .with_created_at(Utc.timestamp_opt(secs, 0).unwrap())
                        .with_step(Step::tool_call(0, "grep")),
                )
                .unwrap();
        }
        (temp, store)
    }

    #[test]
    fn test_stream_is_ordered_and_ignores_later_commits() {
        let (_temp, store) = seeded();

        let mut stream = store.stream_all().unwrap();
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first.id.as_str(), "a");

        store
            .put(
                EpisodeDraft::new("a1", EpisodeStatus::Failure)
                    .with_id("z")
                    .with_created_at(Utc.timestamp_opt(40, 0).unwrap()),
            )
            .unwrap();

        let rest: Vec<String> = stream.map(|r| r.unwrap().id.as_str().to_string()).collect();
        assert_eq!(rest, vec!["b", "c"]);
        assert_eq!(store.count(), 4);
    }

    #[test]
    fn test_filtered_stream_ignores_pagination() {
        let (_temp, store) = seeded();
        let filter = ListFilter::new().status(EpisodeStatus::Failure).limit(1);
        let ids: Vec<String> = store
            .stream_matching(&filter)
            .unwrap()
            .map(|r| r.unwrap().id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
