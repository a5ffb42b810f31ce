//! Step type and the step record
//!
//! On the wire a step is a flat object with a `step_type` discriminator.
//! The conditional fields (`model`, `provider`, `tool_name`) are optional
//! on every step type. A field that does not apply to a type is normally
//! just absent, but carrying it is not an error: an error step may name
//! the tool that failed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of action a step records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// A model invocation
    LlmCall,
    /// A tool invocation
    ToolCall,
    /// The result returned by a tool
    ToolResult,
    /// An agent decision
    Decision,
    /// A recorded failure
    Error,
    /// Any other non-empty step type
    Other(String),
}

impl StepKind {
    pub const LLM_CALL: &'static str = "llm_call";
    pub const TOOL_CALL: &'static str = "tool_call";
    pub const TOOL_RESULT: &'static str = "tool_result";
    pub const DECISION: &'static str = "decision";
    pub const ERROR: &'static str = "error";

    /// Maps a wire name onto a kind. Unknown names are kept as `Other`.
    pub fn parse(step_type: &str) -> Self {
        match step_type {
            Self::LLM_CALL => StepKind::LlmCall,
            Self::TOOL_CALL => StepKind::ToolCall,
            Self::TOOL_RESULT => StepKind::ToolResult,
            Self::DECISION => StepKind::Decision,
            Self::ERROR => StepKind::Error,
            other => StepKind::Other(other.to_string()),
        }
    }

    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            StepKind::LlmCall => Self::LLM_CALL,
            StepKind::ToolCall => Self::TOOL_CALL,
            StepKind::ToolResult => Self::TOOL_RESULT,
            StepKind::Decision => Self::DECISION,
            StepKind::Error => Self::ERROR,
            StepKind::Other(name) => name,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of agent action within an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "StepWire", try_from = "StepWire")]
pub struct Step {
    pub step_index: u64,
    pub kind: StepKind,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub tool_name: Option<String>,
    pub tokens: Option<u64>,
    /// Wall-clock time of the action. Display only, never used for ordering.
    pub timestamp: Option<DateTime<Utc>>,
    pub air_record_id: Option<String>,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub metadata: Map<String, Value>,
}

impl Step {
    /// Creates a step with no optional fields set.
    pub fn new(step_index: u64, kind: StepKind) -> Self {
        Self {
            step_index,
            kind,
            model: None,
            provider: None,
            tool_name: None,
            tokens: None,
            timestamp: None,
            air_record_id: None,
            input_summary: None,
            output_summary: None,
            cost_usd: None,
            duration_ms: None,
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn llm_call(step_index: u64, model: impl Into<String>, provider: Option<&str>) -> Self {
        let mut step = Self::new(step_index, StepKind::LlmCall).with_model(model);
        step.provider = provider.map(str::to_string);
        step
    }

    pub fn tool_call(step_index: u64, tool_name: impl Into<String>) -> Self {
        Self::new(step_index, StepKind::ToolCall).with_tool(tool_name)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = Some(cost_usd);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn step_type(&self) -> &str {
        self.kind.as_str()
    }
}

/// Flat wire form of a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StepWire {
    pub step_index: u64,
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl From<Step> for StepWire {
    fn from(step: Step) -> Self {
        Self {
            step_index: step.step_index,
            step_type: step.kind.as_str().to_string(),
            model: step.model,
            provider: step.provider,
            tool_name: step.tool_name,
            tokens: step.tokens,
            timestamp: step.timestamp,
            air_record_id: step.air_record_id,
            input_summary: step.input_summary,
            output_summary: step.output_summary,
            cost_usd: step.cost_usd,
            duration_ms: step.duration_ms,
            error: step.error,
            metadata: step.metadata,
        }
    }
}

impl TryFrom<StepWire> for Step {
    type Error = String;

    fn try_from(wire: StepWire) -> Result<Self, Self::Error> {
        if wire.step_type.is_empty() {
            return Err("step_type must not be empty".to_string());
        }
        Ok(Self {
            step_index: wire.step_index,
            kind: StepKind::parse(&wire.step_type),
            model: wire.model,
            provider: wire.provider,
            tool_name: wire.tool_name,
            tokens: wire.tokens,
            timestamp: wire.timestamp,
            air_record_id: wire.air_record_id,
            input_summary: wire.input_summary,
            output_summary: wire.output_summary,
            cost_usd: wire.cost_usd,
            duration_ms: wire.duration_ms,
            error: wire.error,
            metadata: wire.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_llm_call_serializes_flat() {
        let step = Step::llm_call(0, "gpt-4", Some("openai")).with_tokens(150);
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(
            value,
            json!({
                "step_index": 0,
                "step_type": "llm_call",
                "model": "gpt-4",
                "provider": "openai",
                "tokens": 150
            })
        );
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let step = Step::new(3, StepKind::Decision);
        let value = serde_json::to_value(&step).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(!obj.contains_key("timestamp"));
        assert!(!obj.contains_key("model"));
    }

    #[test]
    fn test_open_step_type_is_preserved() {
        let step: Step =
            serde_json::from_value(json!({"step_index": 1, "step_type": "handoff"})).unwrap();
        assert_eq!(step.kind, StepKind::Other("handoff".to_string()));
        assert_eq!(step.step_type(), "handoff");
    }

    #[test]
    fn test_tool_result_keeps_tool_name() {
        let step: Step = serde_json::from_value(
            json!({"step_index": 2, "step_type": "tool_result", "tool_name": "web_search"}),
        )
        .unwrap();
        assert_eq!(step.kind, StepKind::ToolResult);
        assert_eq!(step.tool_name.as_deref(), Some("web_search"));
    }

    #[test]
    fn test_conditional_fields_kept_on_any_type() {
        let cases = [
            json!({"step_index": 0, "step_type": "error", "tool_name": "web_search"}),
            json!({"step_index": 1, "step_type": "embedding", "model": "text-embedding-3"}),
            json!({"step_index": 2, "step_type": "tool_call", "provider": "openai"}),
        ];
        for case in cases {
            let step: Step = serde_json::from_value(case.clone()).unwrap();
            assert_eq!(serde_json::to_value(&step).unwrap(), case);
        }
    }

    #[test]
    fn test_error_step_names_failed_tool() {
        let step = Step::new(4, StepKind::Error).with_tool("web_search");
        assert_eq!(step.step_type(), "error");
        assert_eq!(step.tool_name.as_deref(), Some("web_search"));

        let step = Step::tool_call(5, "web_search").with_provider("serpapi");
        assert_eq!(step.provider.as_deref(), Some("serpapi"));
    }

    #[test]
    fn test_parse_round_trips_known_names() {
        for name in ["llm_call", "tool_call", "tool_result", "decision", "error"] {
            assert_eq!(StepKind::parse(name).as_str(), name);
        }
        assert_eq!(StepKind::parse("handoff"), StepKind::Other("handoff".into()));
    }
}
