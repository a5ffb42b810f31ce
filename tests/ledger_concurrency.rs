//! Ledger Concurrency Tests
//!
//! Writers serialize on the store's single writer; readers and exports run
//! alongside and only ever observe fully committed episodes.

use std::sync::Arc;
use std::thread;

use episode_ledger::export::write_ndjson;
use episode_ledger::model::{EpisodeDraft, EpisodeId, EpisodeStatus, Step};
use episode_ledger::query::ListFilter;
use episode_ledger::schema::validate_payload;
use episode_ledger::EpisodeStore;
use serde_json::Value;
use tempfile::TempDir;

const WRITERS: usize = 4;
const PER_WRITER: usize = 10;

fn draft(id: &str) -> EpisodeDraft {
    EpisodeDraft::new("agent-1", EpisodeStatus::Partial)
        .with_id(id)
        .with_step(Step::llm_call(0, "m1", None).with_tokens(1))
        .with_step(Step::tool_call(1, "shell"))
}

#[test]
fn test_concurrent_writers_all_commit() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(EpisodeStore::open(temp.path()).unwrap());

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..PER_WRITER {
                    store.put(draft(&format!("w{}-{}", w, i))).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.count(), WRITERS * PER_WRITER);
    let listed = store.list(&ListFilter::new()).unwrap();
    assert_eq!(listed.len(), WRITERS * PER_WRITER);
    assert!(listed
        .windows(2)
        .all(|w| (w[0].created_at, &w[0].id) <= (w[1].created_at, &w[1].id)));
}

#[test]
fn test_racing_duplicate_ids_commit_once() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(EpisodeStore::open(temp.path()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.put(draft("same")).is_ok())
        })
        .collect();
    let committed = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(committed, 1);
    assert_eq!(store.count(), 1);
}

#[test]
fn test_readers_see_only_complete_episodes() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(EpisodeStore::open(temp.path()).unwrap());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..30 {
                store.put(draft(&format!("e{:02}", i))).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut last_seen = 0;
                for _ in 0..50 {
                    let full = store.list_full(&ListFilter::new()).unwrap();
                    assert!(full.len() >= last_seen);
                    last_seen = full.len();
                    for episode in &full {
                        assert_eq!(episode.steps.len(), 2);
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(store.count(), 30);
    assert!(store.get(&EpisodeId::new("e29")).is_ok());
}

#[test]
fn test_stream_ignores_later_commits() {
    let temp = TempDir::new().unwrap();
    let store = EpisodeStore::open(temp.path()).unwrap();
    store.put(draft("e1")).unwrap();
    store.put(draft("e2")).unwrap();

    let stream = store.stream_all().unwrap();
    store.put(draft("e3")).unwrap();

    let ids: Vec<String> = stream.map(|r| r.unwrap().id.to_string()).collect();
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&"e3".to_string()));
}

/// Episode `n` carries `n % 4 + 1` steps.
fn sized_draft(n: usize) -> EpisodeDraft {
    (0..n % 4 + 1).fold(
        EpisodeDraft::new("agent-2", EpisodeStatus::Success).with_id(format!("x{:03}", n)),
        |draft, i| draft.with_step(Step::tool_call(i as u64, "shell").with_tokens(3)),
    )
}

#[test]
fn test_export_during_puts_emits_only_whole_episodes() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(EpisodeStore::open(temp.path()).unwrap());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for n in 0..40 {
                store.put(sized_draft(n)).unwrap();
            }
        })
    };

    let mut last_emitted = 0;
    for _ in 0..25 {
        let mut out = Vec::new();
        let emitted = write_ndjson(&store, None, &mut out).unwrap();
        assert!(emitted >= last_emitted);
        last_emitted = emitted;

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), emitted);
        for line in lines {
            let value: Value = serde_json::from_str(line).unwrap();
            let draft = validate_payload(&value).unwrap();

            let n: usize = value["id"].as_str().unwrap()[1..].parse().unwrap();
            assert_eq!(draft.steps.len(), n % 4 + 1);
            assert_eq!(value["step_count"], draft.steps.len());
            assert_eq!(value["total_tokens"], 3 * draft.steps.len() as u64);
        }
    }

    writer.join().unwrap();
    let mut out = Vec::new();
    assert_eq!(write_ndjson(&store, None, &mut out).unwrap(), 40);
}
