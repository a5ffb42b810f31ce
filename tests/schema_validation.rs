//! Schema Validation Tests
//!
//! The validator reports every violated field at once and never builds a
//! draft from a payload it rejected.

use episode_ledger::model::{EpisodeStatus, StepKind};
use episode_ledger::schema::validate_payload;
use serde_json::json;

fn fields(payload: serde_json::Value) -> Vec<String> {
    validate_payload(&payload)
        .unwrap_err()
        .violations()
        .iter()
        .map(|v| v.field.clone())
        .collect()
}

#[test]
fn test_minimal_payload_is_accepted() {
    let draft = validate_payload(&json!({ "agent_id": "a1", "status": "success" })).unwrap();
    assert_eq!(draft.agent_id, "a1");
    assert_eq!(draft.status, EpisodeStatus::Success);
    assert!(draft.id.is_none());
    assert!(draft.created_at.is_none());
    assert!(draft.steps.is_empty());
}

#[test]
fn test_full_payload_keeps_optional_fields() {
    let draft = validate_payload(&json!({
        "id": "ep-1",
        "agent_id": "a1",
        "status": "partial",
        "created_at": "2024-06-01T08:30:00Z",
        "metadata": { "run": 3 },
        "steps": [
            {
                "step_index": 2,
                "step_type": "llm_call",
                "model": "gpt-4",
                "provider": "openai",
                "tokens": 120,
                "cost_usd": 0.004,
                "input_summary": "plan the task"
            },
            { "step_index": 5, "step_type": "tool_result", "tool_name": "search", "error": "timeout" },
            { "step_index": 7, "step_type": "reflection", "metadata": { "depth": 1 } }
        ]
    }))
    .unwrap();

    assert_eq!(draft.id.as_ref().map(|id| id.as_str()), Some("ep-1"));
    assert_eq!(draft.metadata["run"], 3);
    assert_eq!(draft.steps.len(), 3);
    assert_eq!(draft.steps[0].cost_usd, Some(0.004));
    assert_eq!(draft.steps[1].error.as_deref(), Some("timeout"));
    assert_eq!(draft.steps[2].kind, StepKind::Other("reflection".to_string()));
}

#[test]
fn test_missing_and_mistyped_fields() {
    let found = fields(json!({ "agent_id": 42, "created_at": "not a time" }));
    assert!(found.contains(&"agent_id".to_string()));
    assert!(found.contains(&"status".to_string()));
    assert!(found.contains(&"created_at".to_string()));
}

#[test]
fn test_status_outside_closed_set() {
    assert_eq!(fields(json!({ "agent_id": "a", "status": "SUCCESS" })), vec!["status"]);
}

#[test]
fn test_step_violations_carry_their_path() {
    let found = fields(json!({
        "agent_id": "a",
        "status": "failure",
        "steps": [
            { "step_index": -1, "step_type": "llm_call" },
            { "step_type": "" },
            { "step_index": 3, "step_type": "decision", "tool_name": 42 },
            "not a step"
        ]
    }));

    assert!(found.contains(&"steps[0].step_index".to_string()));
    assert!(found.contains(&"steps[1].step_index".to_string()));
    assert!(found.contains(&"steps[1].step_type".to_string()));
    assert!(found.contains(&"steps[2].tool_name".to_string()));
    assert!(found.contains(&"steps[3]".to_string()));
}

#[test]
fn test_step_may_carry_fields_of_another_type() {
    let draft = validate_payload(&json!({
        "agent_id": "a",
        "status": "failure",
        "steps": [
            { "step_index": 0, "step_type": "error", "tool_name": "web_search" },
            { "step_index": 1, "step_type": "embedding", "model": "text-embedding-3" },
            { "step_index": 2, "step_type": "tool_call", "provider": "openai" }
        ]
    }))
    .unwrap();

    assert_eq!(draft.steps[0].step_type(), "error");
    assert_eq!(draft.steps[0].tool_name.as_deref(), Some("web_search"));
    assert_eq!(draft.steps[1].kind, StepKind::Other("embedding".to_string()));
    assert_eq!(draft.steps[1].model.as_deref(), Some("text-embedding-3"));
    assert_eq!(draft.steps[2].provider.as_deref(), Some("openai"));
}

#[test]
fn test_duplicate_step_index() {
    let found = fields(json!({
        "agent_id": "a",
        "status": "success",
        "steps": [
            { "step_index": 1, "step_type": "decision" },
            { "step_index": 1, "step_type": "error" }
        ]
    }));
    assert_eq!(found, vec!["steps[1].step_index"]);
}

#[test]
fn test_root_must_be_object() {
    assert_eq!(fields(json!([1, 2, 3])), vec!["$root"]);
}

#[test]
fn test_negative_cost_is_rejected() {
    let found = fields(json!({
        "agent_id": "a",
        "status": "success",
        "steps": [{ "step_index": 0, "step_type": "llm_call", "cost_usd": -0.5 }]
    }));
    assert_eq!(found, vec!["steps[0].cost_usd"]);
}
