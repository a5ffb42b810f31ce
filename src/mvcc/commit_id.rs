//! CommitId - totally ordered commit identity
//!
//! The value is the WAL sequence number of the commit record, so the
//! order survives restarts and is reproduced exactly by WAL replay.

use std::fmt;

/// A totally ordered commit identity.
///
/// `CommitId::ZERO` precedes every real commit and is the view of an
/// empty ledger.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CommitId(u64);

impl CommitId {
    pub const ZERO: CommitId = CommitId(0);

    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_precedes_first_commit() {
        assert!(CommitId::ZERO < CommitId::new(1));
        assert_eq!(CommitId::ZERO.value(), 0);
    }

    #[test]
    fn test_ordering_follows_sequence() {
        let mut ids = vec![CommitId::new(3), CommitId::new(1), CommitId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![CommitId::new(1), CommitId::new(2), CommitId::new(3)]);
    }
}
