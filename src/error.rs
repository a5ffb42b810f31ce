//! Ledger error taxonomy
//!
//! Four outcomes reach callers, each naming the operation that failed and
//! the identifier or fields responsible:
//!
//! - `Validation`: malformed or inconsistent input, fixed by the caller
//! - `Conflict`: duplicate episode id, never overwritten
//! - `NotFound`: the referenced episode does not exist
//! - `Storage`: I/O or durability failure, fatal to the operation
//!
//! Nothing here is retried and nothing is downgraded to a default value.

use std::fmt;

use thiserror::Error;

use crate::model::EpisodeId;
use crate::schema::ValidationError;
use crate::storage::StorageError;
use crate::wal::WalError;

/// The boundary operation an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Ingest,
    Get,
    List,
    Replay,
    Diff,
    Stream,
    Export,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Ingest => "ingest",
            Operation::Get => "get",
            Operation::List => "list",
            Operation::Replay => "replay",
            Operation::Diff => "diff",
            Operation::Stream => "stream",
            Operation::Export => "export",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Low-level cause of a storage failure.
#[derive(Debug, Error)]
pub enum StorageFailure {
    #[error(transparent)]
    Wal(#[from] WalError),

    #[error(transparent)]
    Data(#[from] StorageError),

    /// An earlier fatal error stopped the writer
    #[error("ledger writes halted after a fatal error: {0}")]
    Halted(String),
}

impl StorageFailure {
    pub fn is_fatal(&self) -> bool {
        match self {
            StorageFailure::Wal(e) => e.is_fatal(),
            StorageFailure::Data(e) => e.is_fatal(),
            StorageFailure::Halted(_) => true,
        }
    }
}

/// Errors surfaced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{operation} failed: invalid episode: {source}")]
    Validation {
        operation: Operation,
        #[source]
        source: ValidationError,
    },

    #[error("{operation} failed: episode '{id}' already exists")]
    Conflict { operation: Operation, id: EpisodeId },

    #[error("{operation} failed: episode '{id}' not found")]
    NotFound { operation: Operation, id: EpisodeId },

    #[error("{operation} failed{}: {source}", subject(.id))]
    Storage {
        operation: Operation,
        id: Option<EpisodeId>,
        #[source]
        source: StorageFailure,
    },
}

fn subject(id: &Option<EpisodeId>) -> String {
    match id {
        Some(id) => format!(" for episode '{}'", id),
        None => String::new(),
    }
}

impl LedgerError {
    pub fn validation(operation: Operation, source: ValidationError) -> Self {
        LedgerError::Validation { operation, source }
    }

    pub fn conflict(operation: Operation, id: EpisodeId) -> Self {
        LedgerError::Conflict { operation, id }
    }

    pub fn not_found(operation: Operation, id: EpisodeId) -> Self {
        LedgerError::NotFound { operation, id }
    }

    pub fn storage(
        operation: Operation,
        id: Option<&EpisodeId>,
        source: impl Into<StorageFailure>,
    ) -> Self {
        LedgerError::Storage {
            operation,
            id: id.cloned(),
            source: source.into(),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            LedgerError::Validation { operation, .. }
            | LedgerError::Conflict { operation, .. }
            | LedgerError::NotFound { operation, .. }
            | LedgerError::Storage { operation, .. } => *operation,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation { .. } => "VALIDATION_ERROR",
            LedgerError::Conflict { .. } => "CONFLICT",
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::Storage { .. } => "STORAGE_ERROR",
        }
    }

    /// The episode id the error refers to, if any.
    pub fn episode_id(&self) -> Option<&EpisodeId> {
        match self {
            LedgerError::Conflict { id, .. } | LedgerError::NotFound { id, .. } => Some(id),
            LedgerError::Storage { id, .. } => id.as_ref(),
            LedgerError::Validation { .. } => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::Storage { source, .. } if source.is_fatal())
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
