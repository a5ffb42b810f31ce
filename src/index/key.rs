//! Index keys and entries

use chrono::{DateTime, Utc};

use crate::model::{EpisodeId, EpisodeStatus};
use crate::mvcc::CommitId;

/// Ordering key of an episode: `created_at` ascending, then `id` ascending.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpisodeKey {
    pub created_at: DateTime<Utc>,
    pub id: EpisodeId,
}

impl EpisodeKey {
    pub fn new(created_at: DateTime<Utc>, id: EpisodeId) -> Self {
        Self { created_at, id }
    }

    /// Smallest key at `created_at`; used as an inclusive range start.
    pub fn lower_bound(created_at: DateTime<Utc>) -> Self {
        Self::new(created_at, EpisodeId::new(""))
    }
}

/// Where an episode lives and when it was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Byte offset of the episode record in the episode data file
    pub offset: u64,
    pub commit: CommitId,
}

/// Everything the indexes need to know about one committed episode.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub key: EpisodeKey,
    pub entry: IndexEntry,
    pub agent_id: String,
    pub status: EpisodeStatus,
    pub models: Vec<String>,
    pub providers: Vec<String>,
    pub tools: Vec<String>,
}
