//! NDJSON export of committed episodes
//!
//! One full episode document per line, in commit order. The set of
//! episodes is fixed when the export opens; later commits are not seen.

use std::io::{self, Write};

use tracing::info;

use crate::engine::{EpisodeStore, EpisodeStream};
use crate::error::{LedgerError, LedgerResult, Operation};
use crate::model::{EpisodeDocument, EpisodeId};
use crate::observability::Event;
use crate::query::ListFilter;
use crate::storage::StorageError;

/// Media type of an export body
pub const CONTENT_TYPE: &str = "application/x-ndjson";

/// Lazily encoded export lines, each terminated by `\n`.
pub struct NdjsonRecords<'a> {
    episodes: EpisodeStream<'a>,
    emitted: usize,
}

impl NdjsonRecords<'_> {
    /// Records produced so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

impl Iterator for NdjsonRecords<'_> {
    type Item = LedgerResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let episode = match self.episodes.next()? {
            Ok(episode) => episode,
            Err(e) => return Some(Err(e)),
        };
        let id = episode.id.clone();
        let mut line = match serde_json::to_vec(&EpisodeDocument::from(episode)) {
            Ok(line) => line,
            Err(e) => return Some(Err(encode_failed(&id, e))),
        };
        line.push(b'\n');
        self.emitted += 1;
        Some(Ok(line))
    }
}

/// Opens an export over every episode committed before this call,
/// optionally narrowed by `filter` (pagination is ignored).
pub fn export_records<'a>(
    store: &'a EpisodeStore,
    filter: Option<&ListFilter>,
) -> LedgerResult<NdjsonRecords<'a>> {
    let episodes = store.stream_for(Operation::Export, filter)?;
    info!(
        event = %Event::ExportBegin,
        snapshot = %episodes.view().upper_bound(),
        filtered = filter.is_some(),
        "export started"
    );
    Ok(NdjsonRecords {
        episodes,
        emitted: 0,
    })
}

/// Writes the full export to `out`, returning the number of records.
pub fn write_ndjson<W: Write>(
    store: &EpisodeStore,
    filter: Option<&ListFilter>,
    out: &mut W,
) -> LedgerResult<usize> {
    let mut records = export_records(store, filter)?;
    for line in records.by_ref() {
        out.write_all(&line?).map_err(write_failed)?;
    }
    out.flush().map_err(write_failed)?;

    info!(event = %Event::ExportComplete, records = records.emitted(), "export complete");
    Ok(records.emitted())
}

fn encode_failed(id: &EpisodeId, e: serde_json::Error) -> LedgerError {
    LedgerError::storage(
        Operation::Export,
        Some(id),
        StorageError::write_failed(
            "Failed to encode export record",
            io::Error::new(io::ErrorKind::InvalidData, e),
        ),
    )
}

fn write_failed(e: io::Error) -> LedgerError {
    LedgerError::storage(
        Operation::Export,
        None,
        StorageError::write_failed("Failed to write export output", e),
    )
}
