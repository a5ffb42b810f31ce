//! Episode types: identity, status, draft and stored forms

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::step::Step;
use super::totals::Totals;

/// Unique episode identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(String);

impl EpisodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EpisodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Outcome of an episode. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    Success,
    Failure,
    Partial,
}

impl EpisodeStatus {
    pub const ALL: [EpisodeStatus; 3] = [
        EpisodeStatus::Success,
        EpisodeStatus::Failure,
        EpisodeStatus::Partial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeStatus::Success => "success",
            EpisodeStatus::Failure => "failure",
            EpisodeStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EpisodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EpisodeStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

/// A validated episode that has not been stored yet.
///
/// `id` and `created_at` are optional here; the store assigns whatever
/// is missing when the draft is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeDraft {
    pub id: Option<EpisodeId>,
    pub agent_id: String,
    pub status: EpisodeStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub steps: Vec<Step>,
    pub metadata: Map<String, Value>,
}

impl EpisodeDraft {
    pub fn new(agent_id: impl Into<String>, status: EpisodeStatus) -> Self {
        Self {
            id: None,
            agent_id: agent_id.into(),
            status,
            created_at: None,
            steps: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<EpisodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Finalizes the draft with its assigned identity.
    ///
    /// Steps are sorted by `step_index`.
    pub fn into_episode(self, id: EpisodeId, created_at: DateTime<Utc>) -> Episode {
        let mut steps = self.steps;
        steps.sort_by_key(|s| s.step_index);
        Episode {
            id,
            agent_id: self.agent_id,
            status: self.status,
            created_at,
            steps,
            metadata: self.metadata,
        }
    }
}

impl From<Episode> for EpisodeDraft {
    fn from(episode: Episode) -> Self {
        Self {
            id: Some(episode.id),
            agent_id: episode.agent_id,
            status: episode.status,
            created_at: Some(episode.created_at),
            steps: episode.steps,
            metadata: episode.metadata,
        }
    }
}

impl From<String> for EpisodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A stored, immutable episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub agent_id: String,
    pub status: EpisodeStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Episode {
    pub fn totals(&self) -> Totals {
        Totals::from_steps(&self.steps)
    }

    pub fn summary(&self) -> EpisodeSummary {
        EpisodeSummary {
            id: self.id.clone(),
            agent_id: self.agent_id.clone(),
            status: self.status,
            created_at: self.created_at,
            metadata: self.metadata.clone(),
            totals: self.totals(),
        }
    }
}

/// Episode without steps, as returned by summary listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub id: EpisodeId,
    pub agent_id: String,
    pub status: EpisodeStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(flatten)]
    pub totals: Totals,
}

/// Full episode plus its aggregates, as handed to callers and exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeDocument {
    #[serde(flatten)]
    pub episode: Episode,
    #[serde(flatten)]
    pub totals: Totals,
}

impl From<Episode> for EpisodeDocument {
    fn from(episode: Episode) -> Self {
        let totals = episode.totals();
        Self { episode, totals }
    }
}
