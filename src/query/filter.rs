//! List filters

use chrono::{DateTime, Utc};

use crate::index::IndexField;
use crate::model::EpisodeStatus;

/// Conjunction of optional constraints for listing episodes.
///
/// Equality fields match exactly and case-sensitively. `model`, `provider`
/// and `tool` match when any step carries the value. Time bounds are
/// inclusive. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub agent_id: Option<String>,
    pub status: Option<EpisodeStatus>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub tool: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Matches to skip before the first returned
    pub offset: usize,
    /// Maximum matches returned; `None` means unbounded
    pub limit: Option<usize>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn status(mut self, status: EpisodeStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The equality constraints that can be answered by a secondary index.
    pub fn equality_constraints(&self) -> Vec<(IndexField, &str)> {
        let status = self.status.map(|s| s.as_str());
        [
            (IndexField::AgentId, self.agent_id.as_deref()),
            (IndexField::Model, self.model.as_deref()),
            (IndexField::Provider, self.provider.as_deref()),
            (IndexField::Status, status),
            (IndexField::Tool, self.tool.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .collect()
    }

    /// True if `created_at` falls inside the time bounds.
    pub fn in_time_range(&self, created_at: DateTime<Utc>) -> bool {
        self.since.map_or(true, |s| created_at >= s) && self.until.map_or(true, |u| created_at <= u)
    }
}
