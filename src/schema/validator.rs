//! Episode payload validator
//!
//! Validation semantics:
//! - Required fields are present and correctly typed
//! - `status` is in the closed set
//! - `step_index` values are unique within the episode
//! - `step_type` is a non-empty identifier
//! - Summed tokens, cost and duration stay representable
//! - Conditional fields (`model`, `provider`, `tool_name`) are accepted on any step type
//! - Unknown top-level fields are ignored (derived aggregates may be echoed back)
//!
//! The validator never mutates its input and never stops at the first error.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::errors::{FieldViolation, ValidationError};
use crate::model::{EpisodeDraft, EpisodeId, EpisodeStatus, Step, StepKind, Totals};

/// Validates a raw episode payload and builds a draft from it.
///
/// # Errors
///
/// Returns `ValidationError` listing every violated field.
pub fn validate_payload(payload: &Value) -> Result<EpisodeDraft, ValidationError> {
    let obj = payload.as_object().ok_or_else(|| {
        ValidationError::single(FieldViolation::type_mismatch(
            "$root",
            "object",
            json_type_name(payload),
        ))
    })?;

    let mut violations = Vec::new();

    let id = optional_string(obj, "id", "id", &mut violations).and_then(|id| {
        if id.trim().is_empty() {
            violations.push(FieldViolation::new("id", "non-empty string", "empty string"));
            None
        } else {
            Some(EpisodeId::new(id))
        }
    });

    let agent_id = required_string(obj, "agent_id", "agent_id", &mut violations).and_then(|a| {
        if a.trim().is_empty() {
            violations.push(FieldViolation::new("agent_id", "non-empty string", "empty string"));
            None
        } else {
            Some(a)
        }
    });

    let status = required_string(obj, "status", "status", &mut violations).and_then(|s| {
        match s.parse::<EpisodeStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                violations.push(FieldViolation::new(
                    "status",
                    "one of success, failure, partial",
                    format!("'{}'", s),
                ));
                None
            }
        }
    });

    let created_at = optional_timestamp(obj, "created_at", "created_at", &mut violations);
    let metadata = optional_object(obj, "metadata", "metadata", &mut violations);

    let mut steps = Vec::new();
    match obj.get("steps") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if let Some(step) = validate_step(&format!("steps[{}]", i), item, &mut violations)
                {
                    steps.push((i, step));
                }
            }
        }
        Some(other) => violations.push(FieldViolation::type_mismatch(
            "steps",
            "array",
            json_type_name(other),
        )),
    }

    check_unique_indices(
        steps.iter().map(|(pos, step)| (*pos, step.step_index)),
        &mut violations,
    );
    let steps: Vec<Step> = steps.into_iter().map(|(_, step)| step).collect();
    if violations.is_empty() {
        check_totals(&steps, &mut violations);
    }

    match (agent_id, status) {
        (Some(agent_id), Some(status)) if violations.is_empty() => Ok(EpisodeDraft {
            id,
            agent_id,
            status,
            created_at,
            steps,
            metadata: metadata.unwrap_or_default(),
        }),
        _ => Err(ValidationError::new(violations)),
    }
}

/// Validates a draft built in code rather than parsed from a payload.
///
/// Applies the same invariants the payload validator enforces on fields
/// the type system cannot rule out.
pub fn validate_draft(draft: &EpisodeDraft) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    if let Some(id) = &draft.id {
        if id.as_str().trim().is_empty() {
            violations.push(FieldViolation::new("id", "non-empty string", "empty string"));
        }
    }
    if draft.agent_id.trim().is_empty() {
        violations.push(FieldViolation::new("agent_id", "non-empty string", "empty string"));
    }

    for (i, step) in draft.steps.iter().enumerate() {
        let path = format!("steps[{}]", i);
        if let StepKind::Other(name) = &step.kind {
            if let Some(v) = check_step_type(&path, name) {
                violations.push(v);
            }
        }
        if let Some(cost) = step.cost_usd {
            if !(cost.is_finite() && cost >= 0.0) {
                violations.push(FieldViolation::new(
                    format!("{}.cost_usd", path),
                    "non-negative number",
                    cost.to_string(),
                ));
            }
        }
    }

    check_unique_indices(
        draft.steps.iter().enumerate().map(|(i, s)| (i, s.step_index)),
        &mut violations,
    );
    if violations.is_empty() {
        check_totals(&draft.steps, &mut violations);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(violations))
    }
}

fn validate_step(path: &str, value: &Value, violations: &mut Vec<FieldViolation>) -> Option<Step> {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            violations.push(FieldViolation::type_mismatch(
                path,
                "object",
                json_type_name(value),
            ));
            return None;
        }
    };
    let before = violations.len();
    let field = |name: &str| make_path(path, name);

    let step_index = match obj.get("step_index") {
        None => {
            violations.push(FieldViolation::missing_field(field("step_index")));
            None
        }
        Some(v) => non_negative_integer(&field("step_index"), v, violations),
    };

    let step_type = required_string(obj, "step_type", &field("step_type"), violations)
        .and_then(|t| match check_step_type(&field("step_type"), &t) {
            Some(v) => {
                violations.push(v);
                None
            }
            None => Some(t),
        });

    let model = optional_string(obj, "model", &field("model"), violations);
    let provider = optional_string(obj, "provider", &field("provider"), violations);
    let tool_name = optional_string(obj, "tool_name", &field("tool_name"), violations);

    let tokens = optional_integer(obj, "tokens", &field("tokens"), violations);
    let duration_ms = optional_integer(obj, "duration_ms", &field("duration_ms"), violations);
    let cost_usd = match obj.get("cost_usd") {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_f64() {
            Some(cost) if cost.is_finite() && cost >= 0.0 => Some(cost),
            _ => {
                violations.push(FieldViolation::type_mismatch(
                    field("cost_usd"),
                    "non-negative number",
                    describe(v),
                ));
                None
            }
        },
    };

    let timestamp = optional_timestamp(obj, "timestamp", &field("timestamp"), violations);
    let air_record_id = optional_string(obj, "air_record_id", &field("air_record_id"), violations);
    let input_summary = optional_string(obj, "input_summary", &field("input_summary"), violations);
    let output_summary =
        optional_string(obj, "output_summary", &field("output_summary"), violations);
    let error = optional_string(obj, "error", &field("error"), violations);
    let metadata = optional_object(obj, "metadata", &field("metadata"), violations);

    if violations.len() > before {
        return None;
    }

    Some(Step {
        step_index: step_index?,
        kind: StepKind::parse(&step_type?),
        model,
        provider,
        tool_name,
        tokens,
        timestamp,
        air_record_id,
        input_summary,
        output_summary,
        cost_usd,
        duration_ms,
        error,
        metadata: metadata.unwrap_or_default(),
    })
}

/// Reports the step at which an episode aggregate stops being representable.
fn check_totals(steps: &[Step], violations: &mut Vec<FieldViolation>) {
    if let Err(overflow) = Totals::try_from_steps(steps) {
        violations.push(FieldViolation::new(
            format!("steps[{}].{}", overflow.position(), overflow.field()),
            "episode total within range",
            overflow.to_string(),
        ));
    }
}

/// Reports every step whose index repeats an earlier one.
fn check_unique_indices(
    indices: impl Iterator<Item = (usize, u64)>,
    violations: &mut Vec<FieldViolation>,
) {
    let mut seen: HashMap<u64, usize> = HashMap::new();
    for (pos, index) in indices {
        if let Some(first) = seen.get(&index) {
            violations.push(FieldViolation::new(
                format!("steps[{}].step_index", pos),
                "unique step_index",
                format!("duplicate of steps[{}] ({})", first, index),
            ));
        } else {
            seen.insert(index, pos);
        }
    }
}

fn check_step_type(path: &str, step_type: &str) -> Option<FieldViolation> {
    if step_type.is_empty() {
        Some(FieldViolation::new(path, "non-empty identifier", "empty string"))
    } else if step_type.chars().any(char::is_whitespace) {
        Some(FieldViolation::new(
            path,
            "identifier without whitespace",
            format!("'{}'", step_type),
        ))
    } else {
        None
    }
}

fn required_string(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match obj.get(key) {
        None => {
            violations.push(FieldViolation::missing_field(path));
            None
        }
        Some(Value::Null) => {
            violations.push(FieldViolation::null_value(path));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            violations.push(FieldViolation::type_mismatch(
                path,
                "string",
                json_type_name(other),
            ));
            None
        }
    }
}

fn optional_string(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            violations.push(FieldViolation::type_mismatch(
                path,
                "string",
                json_type_name(other),
            ));
            None
        }
    }
}

fn optional_integer(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<u64> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => non_negative_integer(path, v, violations),
    }
}

fn non_negative_integer(
    path: &str,
    value: &Value,
    violations: &mut Vec<FieldViolation>,
) -> Option<u64> {
    match value.as_u64() {
        Some(n) => Some(n),
        None => {
            violations.push(FieldViolation::type_mismatch(
                path,
                "non-negative integer",
                describe(value),
            ));
            None
        }
    }
}

fn optional_timestamp(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<DateTime<Utc>> {
    let raw = optional_string(obj, key, path, violations)?;
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(_) => {
            violations.push(FieldViolation::new(
                path,
                "RFC 3339 timestamp",
                format!("'{}'", raw),
            ));
            None
        }
    }
}

fn optional_object(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<Map<String, Value>> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(other) => {
            violations.push(FieldViolation::type_mismatch(
                path,
                "object",
                json_type_name(other),
            ));
            None
        }
    }
}

/// Returns the JSON type name for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Numbers are shown by value, everything else by type.
fn describe(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        other => json_type_name(other).to_string(),
    }
}

fn make_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}
