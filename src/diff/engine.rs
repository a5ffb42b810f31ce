//! Position-by-position episode comparison
//!
//! Steps are paired by their rank in `step_index` order, not by index
//! value. Aggregate deltas are right minus left.

use serde::Serialize;
use serde_json::{json, Value};

use crate::model::{round_cost, Episode, EpisodeId, Step};

/// The compared fields of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFields {
    pub step_index: u64,
    pub step_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
}

impl StepFields {
    fn of(step: &Step) -> Self {
        Self {
            step_index: step.step_index,
            step_type: step.step_type().to_string(),
            model: step.model.clone(),
            provider: step.provider.clone(),
            tool_name: step.tool_name.clone(),
            tokens: step.tokens,
        }
    }
}

/// One differing field at a paired position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    pub left: Value,
    pub right: Value,
}

/// Classification of one position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Change {
    Unchanged,
    Changed { fields: Vec<FieldChange> },
    Added { right: StepFields },
    Removed { left: StepFields },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDiff {
    pub position: usize,
    #[serde(flatten)]
    pub change: Change,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub unchanged: usize,
    pub changed: usize,
    pub added: usize,
    pub removed: usize,
}

/// Structural comparison of two episodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeDiff {
    pub left_id: EpisodeId,
    pub right_id: EpisodeId,
    pub left_step_count: usize,
    pub right_step_count: usize,
    pub positions: Vec<StepDiff>,
    pub summary: DiffSummary,
    /// Right total tokens minus left
    pub token_delta: i64,
    /// Right total cost minus left, rounded to 6 places
    pub cost_delta: f64,
    /// Right total duration minus left, in milliseconds
    pub duration_delta: i64,
}

/// Compares `left` and `right` position by position.
pub fn diff_episodes(left: &Episode, right: &Episode) -> EpisodeDiff {
    let left_steps = ordered(left);
    let right_steps = ordered(right);
    let len = left_steps.len().max(right_steps.len());

    let mut summary = DiffSummary::default();
    let mut positions = Vec::with_capacity(len);

    for position in 0..len {
        let change = match (left_steps.get(position), right_steps.get(position)) {
            (Some(l), Some(r)) => {
                let fields = compare(l, r);
                if fields.is_empty() {
                    summary.unchanged += 1;
                    Change::Unchanged
                } else {
                    summary.changed += 1;
                    Change::Changed { fields }
                }
            }
            (None, Some(r)) => {
                summary.added += 1;
                Change::Added {
                    right: StepFields::of(r),
                }
            }
            (Some(l), None) => {
                summary.removed += 1;
                Change::Removed {
                    left: StepFields::of(l),
                }
            }
            (None, None) => break,
        };
        positions.push(StepDiff { position, change });
    }

    let left_totals = left.totals();
    let right_totals = right.totals();

    EpisodeDiff {
        left_id: left.id.clone(),
        right_id: right.id.clone(),
        left_step_count: left_steps.len(),
        right_step_count: right_steps.len(),
        positions,
        summary,
        token_delta: signed_delta(left_totals.total_tokens, right_totals.total_tokens),
        cost_delta: round_cost(right_totals.total_cost_usd - left_totals.total_cost_usd),
        duration_delta: signed_delta(left_totals.total_duration_ms, right_totals.total_duration_ms),
    }
}

/// `right - left`, saturated to the `i64` range.
fn signed_delta(left: u64, right: u64) -> i64 {
    let delta = i128::from(right) - i128::from(left);
    i64::try_from(delta).unwrap_or(if delta < 0 { i64::MIN } else { i64::MAX })
}

fn ordered(episode: &Episode) -> Vec<&Step> {
    let mut steps: Vec<&Step> = episode.steps.iter().collect();
    steps.sort_by_key(|s| s.step_index);
    steps
}

fn compare(left: &Step, right: &Step) -> Vec<FieldChange> {
    let pairs = [
        ("step_type", json!(left.step_type()), json!(right.step_type())),
        ("model", json!(left.model), json!(right.model)),
        ("provider", json!(left.provider), json!(right.provider)),
        ("tool_name", json!(left.tool_name), json!(right.tool_name)),
        ("tokens", json!(left.tokens), json!(right.tokens)),
    ];
    pairs
        .into_iter()
        .filter(|(_, l, r)| l != r)
        .map(|(field, left, right)| FieldChange { field, left, right })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EpisodeDraft, EpisodeStatus, StepKind};
    use chrono::Utc;

    fn episode(id: &str, steps: Vec<Step>) -> Episode {
        let mut draft = EpisodeDraft::new("a1", EpisodeStatus::Success);
        for step in steps {
            draft = draft.with_step(step);
        }
        draft.into_episode(EpisodeId::new(id), Utc::now())
    }

    #[test]
    fn test_identical_episodes_are_unchanged() {
        let steps = || {
            vec![
                Step::llm_call(0, "gpt-4", Some("openai")).with_tokens(10),
                Step::tool_call(1, "grep"),
            ]
        };
        let diff = diff_episodes(&episode("l", steps()), &episode("r", steps()));
        assert_eq!(diff.summary.unchanged, 2);
        assert_eq!(diff.summary.changed + diff.summary.added + diff.summary.removed, 0);
        assert_eq!(diff.token_delta, 0);
    }

    #[test]
    fn test_changed_fields_are_listed() {
        let left = episode("l", vec![Step::llm_call(0, "gpt-4", Some("openai")).with_tokens(10)]);
        let right = episode("r", vec![Step::llm_call(0, "gpt-3.5", Some("openai")).with_tokens(12)]);
        let diff = diff_episodes(&left, &right);

        let Change::Changed { fields } = &diff.positions[0].change else {
            panic!("expected changed, got {:?}", diff.positions[0].change);
        };
        let names: Vec<&str> = fields.iter().map(|f| f.field).collect();
        assert_eq!(names, vec!["model", "tokens"]);
        assert_eq!(fields[0].left, json!("gpt-4"));
        assert_eq!(fields[0].right, json!("gpt-3.5"));
        assert_eq!(diff.token_delta, 2);
    }

    #[test]
    fn test_length_mismatch_counts_added_and_removed() {
        let short = episode("s", vec![Step::tool_call(0, "grep")]);
        let long = episode(
            "l",
            vec![
                Step::tool_call(0, "grep"),
                Step::new(1, StepKind::Decision).with_tokens(4),
                Step::new(2, StepKind::Error),
            ],
        );

        let diff = diff_episodes(&short, &long);
        assert_eq!(diff.summary, DiffSummary { unchanged: 1, changed: 0, added: 2, removed: 0 });
        assert_eq!(diff.positions.len(), 3);

        let diff = diff_episodes(&long, &short);
        assert_eq!(diff.summary.removed, 2);
        assert_eq!(diff.token_delta, -4);
        let total = diff.summary.unchanged + diff.summary.changed + diff.summary.added + diff.summary.removed;
        assert_eq!(total, diff.left_step_count.max(diff.right_step_count));
    }

    #[test]
    fn test_deltas_beyond_i64_saturate() {
        let small = episode("s", vec![Step::tool_call(0, "grep").with_tokens(0)]);
        let huge = episode(
            "h",
            vec![Step::tool_call(0, "grep").with_tokens(u64::MAX).with_duration(u64::MAX)],
        );

        let diff = diff_episodes(&small, &huge);
        assert_eq!(diff.token_delta, i64::MAX);
        assert_eq!(diff.duration_delta, i64::MAX);

        let diff = diff_episodes(&huge, &small);
        assert_eq!(diff.token_delta, i64::MIN);
        assert_eq!(diff.duration_delta, i64::MIN);
    }

    #[test]
    fn test_diff_against_self_is_all_unchanged() {
        let ep = episode("e", vec![Step::tool_call(0, "grep"), Step::llm_call(1, "m", None)]);
        let diff = diff_episodes(&ep, &ep);
        assert_eq!(diff.summary.unchanged, 2);
        assert_eq!(diff.cost_delta, 0.0);
    }

    #[test]
    fn test_serialized_shape() {
        let left = episode("l", vec![Step::tool_call(0, "grep")]);
        let right = episode("r", vec![Step::tool_call(0, "grep"), Step::tool_call(1, "curl")]);
        let json = serde_json::to_value(diff_episodes(&left, &right)).unwrap();
        assert_eq!(json["positions"][0]["kind"], "unchanged");
        assert_eq!(json["positions"][1]["kind"], "added");
        assert_eq!(json["positions"][1]["right"]["tool_name"], "curl");
        assert_eq!(json["summary"]["added"], 1);
    }
}
