//! List planner
//!
//! Scan selection (strict order):
//! 1. No equality filter: walk the primary index within the time bounds
//! 2. Otherwise drive from the smallest matching secondary set and check
//!    the others; ties broken by field name
//!
//! A filter value with no secondary entry short-circuits to an empty
//! result. Either scan yields keys in `(created_at, id)` order, so offset
//! and limit apply after filtering without a sort.

use std::collections::BTreeSet;
use std::ops::Bound;

use super::filter::ListFilter;
use crate::index::{EpisodeKey, IndexEntry, IndexField, LedgerIndex};
use crate::mvcc::ReadView;

/// How a list request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    /// Ordered walk of the primary index
    PrimaryRange,
    /// Intersection driven by one secondary index
    IndexedEquality,
    /// Some filter value is not indexed at all
    Empty,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::PrimaryRange => "PRIMARY_RANGE",
            ScanType::IndexedEquality => "INDEX_EQ",
            ScanType::Empty => "EMPTY",
        }
    }
}

/// Result of planning and executing a list filter against the index.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub scan_type: ScanType,
    /// Secondary index that drove the scan
    pub driver: Option<IndexField>,
    /// Keys examined before offset and limit
    pub candidates: usize,
    /// Matching keys after offset and limit, in order
    pub matches: Vec<(EpisodeKey, IndexEntry)>,
}

/// Resolves `filter` to ordered index entries visible in `view`.
pub fn plan(index: &LedgerIndex, filter: &ListFilter, view: ReadView) -> QueryPlan {
    let limit = filter.limit.unwrap_or(usize::MAX);
    let constraints = filter.equality_constraints();

    if constraints.is_empty() {
        let mut candidates = 0;
        let matches = index
            .range(filter.since, filter.until, view)
            .inspect(|_| candidates += 1)
            .skip(filter.offset)
            .take(limit)
            .map(|(key, entry)| (key.clone(), *entry))
            .collect();
        return QueryPlan {
            scan_type: ScanType::PrimaryRange,
            driver: None,
            candidates,
            matches,
        };
    }

    let mut sets: Vec<(IndexField, &BTreeSet<EpisodeKey>)> = Vec::with_capacity(constraints.len());
    for (field, value) in constraints {
        match index.secondary(field).lookup(value) {
            Some(set) => sets.push((field, set)),
            None => {
                return QueryPlan {
                    scan_type: ScanType::Empty,
                    driver: Some(field),
                    candidates: 0,
                    matches: Vec::new(),
                }
            }
        }
    }
    // Stable sort keeps field-name order among equal sizes.
    sets.sort_by_key(|(_, set)| set.len());
    let (driver_field, driver) = sets[0];
    let others = &sets[1..];

    let start = match filter.since {
        Some(ts) => Bound::Included(EpisodeKey::lower_bound(ts)),
        None => Bound::Unbounded,
    };

    let mut candidates = 0;
    let matches = driver
        .range((start, Bound::Unbounded))
        .take_while(|key| filter.in_time_range(key.created_at))
        .inspect(|_| candidates += 1)
        .filter(|key| others.iter().all(|(_, set)| set.contains(*key)))
        .filter_map(|key| {
            index
                .entry(key)
                .filter(|entry| view.is_visible(entry.commit))
                .map(|entry| (key.clone(), entry))
        })
        .skip(filter.offset)
        .take(limit)
        .collect();

    QueryPlan {
        scan_type: ScanType::IndexedEquality,
        driver: Some(driver_field),
        candidates,
        matches,
    }
}
