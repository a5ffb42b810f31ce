//! ReadView - stable snapshot boundary
//!
//! Defined by a single scalar: the highest commit visible to the read.
//! Established at read start and never changed afterwards.

use super::CommitId;

/// A stable snapshot boundary for read operations.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ReadView {
    read_upper_bound: CommitId,
}

impl ReadView {
    #[inline]
    pub fn new(upper_bound: CommitId) -> Self {
        Self {
            read_upper_bound: upper_bound,
        }
    }

    #[inline]
    pub fn upper_bound(&self) -> CommitId {
        self.read_upper_bound
    }

    /// Returns true if a commit is part of this snapshot.
    #[inline]
    pub fn is_visible(&self, commit: CommitId) -> bool {
        commit <= self.read_upper_bound
    }
}
