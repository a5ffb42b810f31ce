//! Secondary indexes: field value -> ordered set of episode keys

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::key::EpisodeKey;

/// The fields with a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexField {
    AgentId,
    Status,
    /// Any step's `model`
    Model,
    /// Any step's `provider`
    Provider,
    /// Any step's `tool_name`
    Tool,
}

impl IndexField {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexField::AgentId => "agent_id",
            IndexField::Status => "status",
            IndexField::Model => "model",
            IndexField::Provider => "provider",
            IndexField::Tool => "tool",
        }
    }
}

impl fmt::Display for IndexField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single secondary index.
#[derive(Debug, Default)]
pub struct SecondaryIndex {
    tree: BTreeMap<String, BTreeSet<EpisodeKey>>,
}

impl SecondaryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: &str, key: EpisodeKey) {
        self.tree.entry(value.to_string()).or_default().insert(key);
    }

    /// Exact-match lookup. `None` means no episode has this value.
    pub fn lookup(&self, value: &str) -> Option<&BTreeSet<EpisodeKey>> {
        self.tree.get(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EpisodeId;
    use chrono::{TimeZone, Utc};

    fn key(secs: i64, id: &str) -> EpisodeKey {
        EpisodeKey::new(Utc.timestamp_opt(secs, 0).unwrap(), EpisodeId::new(id))
    }

    #[test]
    fn test_postings_ordered_by_key() {
        let mut index = SecondaryIndex::new();
        index.insert("gpt-4", key(30, "c"));
        index.insert("gpt-4", key(10, "b"));
        index.insert("gpt-4", key(10, "a"));

        let ids: Vec<&str> = index
            .lookup("gpt-4")
            .unwrap()
            .iter()
            .map(|k| k.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_lookup_is_exact() {
        let mut index = SecondaryIndex::new();
        index.insert("web_search", key(1, "a"));
        assert!(index.lookup("web").is_none());
        assert!(index.lookup("Web_search").is_none());
        assert_eq!(index.lookup("web_search").map(|keys| keys.len()), Some(1));
    }
}
