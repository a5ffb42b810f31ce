//! Query Filter Tests
//!
//! Filters combine with AND, results come back in `created_at` then id
//! order, and pagination applies after filtering.

use chrono::{DateTime, TimeZone, Utc};
use episode_ledger::model::{EpisodeDraft, EpisodeStatus, Step};
use episode_ledger::query::ListFilter;
use episode_ledger::EpisodeStore;
use tempfile::TempDir;

// =============================================================================
// Fixture
// =============================================================================

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap()
}

/// Six episodes across two agents, two providers and two tools.
fn seeded() -> (TempDir, EpisodeStore) {
    let temp = TempDir::new().unwrap();
    let store = EpisodeStore::open(temp.path()).unwrap();

    let episodes = [
        ("e1", "planner", EpisodeStatus::Success, 1, "gpt-4", "openai", "search"),
        ("e2", "planner", EpisodeStatus::Failure, 2, "claude-3", "anthropic", "search"),
        ("e3", "coder", EpisodeStatus::Success, 3, "gpt-4", "openai", "shell"),
        ("e4", "coder", EpisodeStatus::Failure, 4, "gpt-4", "openai", "search"),
        ("e5", "planner", EpisodeStatus::Partial, 5, "claude-3", "anthropic", "shell"),
        // Same timestamp as e5; ties break on id.
        ("e0", "coder", EpisodeStatus::Success, 5, "claude-3", "anthropic", "shell"),
    ];

    // Inserted out of time order on purpose.
    for (id, agent, status, hour, model, provider, tool) in episodes.iter().rev() {
        store
            .put(
                EpisodeDraft::new(*agent, *status)
                    .with_id(*id)
                    .with_created_at(at(*hour))
                    .with_step(Step::llm_call(0, *model, Some(*provider)).with_tokens(10))
                    .with_step(Step::tool_call(1, *tool)),
            )
            .unwrap();
    }

    (temp, store)
}

fn ids(store: &EpisodeStore, filter: &ListFilter) -> Vec<String> {
    store
        .list(filter)
        .unwrap()
        .into_iter()
        .map(|s| s.id.to_string())
        .collect()
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_unfiltered_list_is_time_then_id_ordered() {
    let (_temp, store) = seeded();
    assert_eq!(
        ids(&store, &ListFilter::new()),
        vec!["e1", "e2", "e3", "e4", "e0", "e5"]
    );
}

// =============================================================================
// Equality Filters
// =============================================================================

#[test]
fn test_single_field_filters() {
    let (_temp, store) = seeded();

    assert_eq!(
        ids(&store, &ListFilter::new().agent_id("planner")),
        vec!["e1", "e2", "e5"]
    );
    assert_eq!(
        ids(&store, &ListFilter::new().status(EpisodeStatus::Failure)),
        vec!["e2", "e4"]
    );
    assert_eq!(
        ids(&store, &ListFilter::new().provider("anthropic")),
        vec!["e2", "e0", "e5"]
    );
    assert_eq!(
        ids(&store, &ListFilter::new().tool("shell")),
        vec!["e3", "e0", "e5"]
    );
}

#[test]
fn test_filters_combine_with_and() {
    let (_temp, store) = seeded();

    let filter = ListFilter::new().agent_id("coder").model("gpt-4").tool("search");
    assert_eq!(ids(&store, &filter), vec!["e4"]);

    let filter = ListFilter::new()
        .agent_id("planner")
        .status(EpisodeStatus::Success)
        .provider("anthropic");
    assert!(ids(&store, &filter).is_empty());
}

#[test]
fn test_unknown_value_matches_nothing() {
    let (_temp, store) = seeded();
    assert!(ids(&store, &ListFilter::new().model("llama")).is_empty());
    assert!(ids(&store, &ListFilter::new().agent_id("nobody")).is_empty());
}

// =============================================================================
// Time Range
// =============================================================================

#[test]
fn test_time_bounds_are_inclusive() {
    let (_temp, store) = seeded();

    let filter = ListFilter::new().since(at(2)).until(at(4));
    assert_eq!(ids(&store, &filter), vec!["e2", "e3", "e4"]);

    let filter = ListFilter::new().since(at(5));
    assert_eq!(ids(&store, &filter), vec!["e0", "e5"]);

    let filter = ListFilter::new().tool("search").until(at(2));
    assert_eq!(ids(&store, &filter), vec!["e1", "e2"]);
}

// =============================================================================
// Pagination
// =============================================================================

#[test]
fn test_pagination_applies_after_filtering() {
    let (_temp, store) = seeded();

    let filter = ListFilter::new().agent_id("coder").offset(1).limit(1);
    assert_eq!(ids(&store, &filter), vec!["e4"]);

    let filter = ListFilter::new().offset(4);
    assert_eq!(ids(&store, &filter), vec!["e0", "e5"]);

    let filter = ListFilter::new().offset(10);
    assert!(ids(&store, &filter).is_empty());
}

#[test]
fn test_summaries_carry_aggregates() {
    let (_temp, store) = seeded();
    let summaries = store.list(&ListFilter::new().agent_id("coder").limit(1)).unwrap();

    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.id.as_str(), "e3");
    assert_eq!(summary.totals.step_count, 2);
    assert_eq!(summary.totals.total_tokens, 10);
    assert_eq!(summary.totals.tools_used, vec!["shell".to_string()]);
}

#[test]
fn test_stream_matching_ignores_pagination() {
    let (_temp, store) = seeded();
    let filter = ListFilter::new().agent_id("planner").limit(1);

    let streamed: Vec<String> = store
        .stream_matching(&filter)
        .unwrap()
        .map(|r| r.unwrap().id.to_string())
        .collect();
    assert_eq!(streamed, vec!["e1", "e2", "e5"]);
}
