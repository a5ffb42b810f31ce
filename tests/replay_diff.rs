//! Replay and Diff Tests
//!
//! Replay renumbers steps densely without changing their content; diff
//! compares stored episodes position by position.

use episode_ledger::diff::Change;
use episode_ledger::model::{EpisodeDraft, EpisodeId, EpisodeStatus, Step, StepKind};
use episode_ledger::{EpisodeStore, Operation};
use tempfile::TempDir;

fn store() -> (TempDir, EpisodeStore) {
    let temp = TempDir::new().unwrap();
    let store = EpisodeStore::open(temp.path()).unwrap();
    (temp, store)
}

// =============================================================================
// Replay
// =============================================================================

#[test]
fn test_replay_renumbers_sparse_steps() {
    let (_temp, store) = store();
    store
        .put(
            EpisodeDraft::new("agent-1", EpisodeStatus::Failure)
                .with_id("e1")
                .with_step(Step::tool_call(30, "shell").with_cost(0.25))
                .with_step(Step::llm_call(10, "gpt-4", None).with_tokens(7))
                .with_step(Step::new(20, StepKind::Decision)),
        )
        .unwrap();

    let view = store.replay(&EpisodeId::new("e1")).unwrap();
    assert_eq!(view.original_status, EpisodeStatus::Failure);

    let indices: Vec<u64> = view.replay_steps.iter().map(|s| s.step_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let types: Vec<&str> = view.replay_steps.iter().map(|s| s.step_type()).collect();
    assert_eq!(types, vec!["llm_call", "decision", "tool_call"]);
    assert_eq!(view.replay_steps[0].tokens, Some(7));
    assert_eq!(view.total_tokens, 7);
    assert_eq!(view.tools_used, vec!["shell".to_string()]);

    // The stored episode keeps its original indices.
    let stored = store.get(&EpisodeId::new("e1")).unwrap();
    let mut original: Vec<u64> = stored.steps.iter().map(|s| s.step_index).collect();
    original.sort_unstable();
    assert_eq!(original, vec![10, 20, 30]);
}

#[test]
fn test_replay_of_missing_episode() {
    let (_temp, store) = store();
    let err = store.replay(&EpisodeId::new("ghost")).unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(err.operation(), Operation::Replay);
}

// =============================================================================
// Diff
// =============================================================================

#[test]
fn test_diff_reports_positional_changes() {
    let (_temp, store) = store();
    store
        .put(
            EpisodeDraft::new("agent-1", EpisodeStatus::Success)
                .with_id("left")
                .with_step(Step::llm_call(0, "gpt-4", Some("openai")).with_tokens(100))
                .with_step(Step::tool_call(1, "search").with_duration(50))
                .with_step(Step::tool_call(2, "shell")),
        )
        .unwrap();
    store
        .put(
            EpisodeDraft::new("agent-1", EpisodeStatus::Success)
                .with_id("right")
                .with_step(Step::llm_call(5, "gpt-4", Some("openai")).with_tokens(100))
                .with_step(Step::tool_call(9, "browse").with_duration(80)),
        )
        .unwrap();

    let diff = store
        .diff(&EpisodeId::new("left"), &EpisodeId::new("right"))
        .unwrap();

    assert_eq!(diff.left_step_count, 3);
    assert_eq!(diff.right_step_count, 2);
    assert_eq!(diff.positions.len(), 3);
    assert_eq!(diff.positions[0].change, Change::Unchanged);
    match &diff.positions[1].change {
        Change::Changed { fields } => {
            let names: Vec<&str> = fields.iter().map(|f| f.field).collect();
            assert_eq!(names, vec!["tool_name"]);
        }
        other => panic!("expected a change at position 1, got {:?}", other),
    }
    assert!(matches!(diff.positions[2].change, Change::Removed { .. }));

    assert_eq!(diff.summary.unchanged, 1);
    assert_eq!(diff.summary.changed, 1);
    assert_eq!(diff.summary.removed, 1);
    assert_eq!(diff.summary.added, 0);
    assert_eq!(diff.token_delta, 0);
    assert_eq!(diff.duration_delta, 30);
}

#[test]
fn test_diff_is_antisymmetric_in_additions() {
    let (_temp, store) = store();
    store
        .put(
            EpisodeDraft::new("a", EpisodeStatus::Success)
                .with_id("short")
                .with_step(Step::new(0, StepKind::Decision)),
        )
        .unwrap();
    store
        .put(
            EpisodeDraft::new("a", EpisodeStatus::Success)
                .with_id("long")
                .with_step(Step::new(0, StepKind::Decision))
                .with_step(Step::llm_call(1, "m", None).with_tokens(3)),
        )
        .unwrap();

    let forward = store
        .diff(&EpisodeId::new("short"), &EpisodeId::new("long"))
        .unwrap();
    let backward = store
        .diff(&EpisodeId::new("long"), &EpisodeId::new("short"))
        .unwrap();

    assert_eq!(forward.summary.added, 1);
    assert_eq!(backward.summary.removed, 1);
    assert_eq!(forward.token_delta, 3);
    assert_eq!(backward.token_delta, -3);
}

#[test]
fn test_diff_names_the_missing_side() {
    let (_temp, store) = store();
    store
        .put(EpisodeDraft::new("a", EpisodeStatus::Success).with_id("present"))
        .unwrap();

    let err = store
        .diff(&EpisodeId::new("present"), &EpisodeId::new("absent"))
        .unwrap_err();
    assert_eq!(err.operation(), Operation::Diff);
    assert_eq!(err.episode_id().map(|id| id.as_str()), Some("absent"));

    let err = store
        .diff(&EpisodeId::new("gone-left"), &EpisodeId::new("gone-right"))
        .unwrap_err();
    assert_eq!(err.episode_id().map(|id| id.as_str()), Some("gone-left"));
}
