//! Ledger index manager
//!
//! Holds the primary ordering index, the id lookup and the secondary
//! indexes, plus the highest published commit.
//!
//! # API
//!
//! - `insert(record)` - Publish a committed episode
//! - `read_view()` - Capture the current snapshot boundary
//! - `locate(id, view)` - Find an episode by id
//! - `secondary(field)` - Access a secondary index
//! - `range(since, until, view)` - Ordered walk of the primary index
//! - `next_after(key, view)` - Cursor step for streaming reads

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use chrono::{DateTime, Utc};

use super::key::{EpisodeKey, IndexEntry, IndexRecord};
use super::secondary::{IndexField, SecondaryIndex};
use crate::model::EpisodeId;
use crate::mvcc::{CommitId, ReadView};

/// In-memory indexes over every committed episode.
#[derive(Debug)]
pub struct LedgerIndex {
    primary: BTreeMap<EpisodeKey, IndexEntry>,
    by_id: HashMap<EpisodeId, EpisodeKey>,
    agent_id: SecondaryIndex,
    status: SecondaryIndex,
    model: SecondaryIndex,
    provider: SecondaryIndex,
    tool: SecondaryIndex,
    last_commit: CommitId,
}

impl Default for LedgerIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerIndex {
    pub fn new() -> Self {
        Self {
            primary: BTreeMap::new(),
            by_id: HashMap::new(),
            agent_id: SecondaryIndex::new(),
            status: SecondaryIndex::new(),
            model: SecondaryIndex::new(),
            provider: SecondaryIndex::new(),
            tool: SecondaryIndex::new(),
            last_commit: CommitId::ZERO,
        }
    }

    /// Publishes a committed episode.
    ///
    /// Returns `false`, leaving the index untouched, if the id is already
    /// present.
    pub fn insert(&mut self, record: IndexRecord) -> bool {
        if self.by_id.contains_key(&record.key.id) {
            return false;
        }

        let key = record.key;
        self.agent_id.insert(&record.agent_id, key.clone());
        self.status.insert(record.status.as_str(), key.clone());
        for model in &record.models {
            self.model.insert(model, key.clone());
        }
        for provider in &record.providers {
            self.provider.insert(provider, key.clone());
        }
        for tool in &record.tools {
            self.tool.insert(tool, key.clone());
        }

        self.by_id.insert(key.id.clone(), key.clone());
        self.primary.insert(key, record.entry);
        self.last_commit = self.last_commit.max(record.entry.commit);
        true
    }

    pub fn contains(&self, id: &EpisodeId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Number of indexed episodes.
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    pub fn last_commit(&self) -> CommitId {
        self.last_commit
    }

    /// Captures the current snapshot boundary.
    pub fn read_view(&self) -> ReadView {
        ReadView::new(self.last_commit)
    }

    /// Finds an episode visible in `view`.
    pub fn locate(&self, id: &EpisodeId, view: ReadView) -> Option<(EpisodeKey, IndexEntry)> {
        let key = self.by_id.get(id)?;
        let entry = self.primary.get(key)?;
        view.is_visible(entry.commit).then(|| (key.clone(), *entry))
    }

    pub fn entry(&self, key: &EpisodeKey) -> Option<IndexEntry> {
        self.primary.get(key).copied()
    }

    pub fn secondary(&self, field: IndexField) -> &SecondaryIndex {
        match field {
            IndexField::AgentId => &self.agent_id,
            IndexField::Status => &self.status,
            IndexField::Model => &self.model,
            IndexField::Provider => &self.provider,
            IndexField::Tool => &self.tool,
        }
    }

    /// Walks the primary index in order, bounded by `created_at` (inclusive).
    pub fn range(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        view: ReadView,
    ) -> impl Iterator<Item = (&EpisodeKey, &IndexEntry)> + '_ {
        let start = match since {
            Some(ts) => Bound::Included(EpisodeKey::lower_bound(ts)),
            None => Bound::Unbounded,
        };
        self.primary
            .range((start, Bound::Unbounded))
            .take_while(move |(key, _)| until.map_or(true, |u| key.created_at <= u))
            .filter(move |(_, entry)| view.is_visible(entry.commit))
    }

    /// Returns the first visible episode strictly after `after`.
    pub fn next_after(
        &self,
        after: Option<&EpisodeKey>,
        view: ReadView,
    ) -> Option<(EpisodeKey, IndexEntry)> {
        let start = match after {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        self.primary
            .range((start, Bound::Unbounded))
            .find(|(_, entry)| view.is_visible(entry.commit))
            .map(|(key, entry)| (key.clone(), *entry))
    }
}
