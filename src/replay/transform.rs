//! Replay view of a stored episode
//!
//! Steps are renumbered densely from 0 in stored order and lose their
//! timestamps. Every other step field is carried over unchanged.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::model::{Episode, EpisodeId, EpisodeStatus, Step, StepKind};

/// A step prepared for replay. Has no timestamp by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStep {
    pub step_index: u64,
    pub kind: StepKind,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub tool_name: Option<String>,
    pub tokens: Option<u64>,
    pub air_record_id: Option<String>,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub metadata: Map<String, Value>,
}

impl ReplayStep {
    fn from_step(step_index: u64, step: &Step) -> Self {
        Self {
            step_index,
            kind: step.kind.clone(),
            model: step.model.clone(),
            provider: step.provider.clone(),
            tool_name: step.tool_name.clone(),
            tokens: step.tokens,
            air_record_id: step.air_record_id.clone(),
            input_summary: step.input_summary.clone(),
            output_summary: step.output_summary.clone(),
            cost_usd: step.cost_usd,
            duration_ms: step.duration_ms,
            error: step.error.clone(),
            metadata: step.metadata.clone(),
        }
    }

    pub fn step_type(&self) -> &str {
        self.kind.as_str()
    }

    /// Converts back into a step with no timestamp.
    pub fn into_step(self) -> Step {
        Step {
            step_index: self.step_index,
            kind: self.kind,
            model: self.model,
            provider: self.provider,
            tool_name: self.tool_name,
            tokens: self.tokens,
            timestamp: None,
            air_record_id: self.air_record_id,
            input_summary: self.input_summary,
            output_summary: self.output_summary,
            cost_usd: self.cost_usd,
            duration_ms: self.duration_ms,
            error: self.error,
            metadata: self.metadata,
        }
    }
}

// Same flat shape as a stored step; the timestamp is absent so it is
// never written.
impl Serialize for ReplayStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.clone().into_step().serialize(serializer)
    }
}

/// Replay view of one episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayView {
    pub episode_id: EpisodeId,
    pub agent_id: String,
    pub original_status: EpisodeStatus,
    pub replay_steps: Vec<ReplayStep>,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub tools_used: Vec<String>,
}

/// Builds the replay view of `episode`.
pub fn to_replay(episode: &Episode) -> ReplayView {
    let totals = episode.totals();
    let replay_steps = episode
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| ReplayStep::from_step(i as u64, step))
        .collect();

    ReplayView {
        episode_id: episode.id.clone(),
        agent_id: episode.agent_id.clone(),
        original_status: episode.status,
        replay_steps,
        total_tokens: totals.total_tokens,
        total_cost_usd: totals.total_cost_usd,
        tools_used: totals.tools_used,
    }
}
