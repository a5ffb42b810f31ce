//! Storage error types
//!
//! Error codes:
//! - LEDGER_STORAGE_WRITE_FAILED (ERROR severity)
//! - LEDGER_STORAGE_READ_FAILED (ERROR severity)
//! - LEDGER_STORAGE_CORRUPTION (FATAL severity)
//! - LEDGER_STORAGE_TORN_TAIL (ERROR severity, repaired by truncation at open)

use std::fmt;
use std::io;

use crate::wal::Severity;

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    WriteFailed,
    ReadFailed,
    /// Checksum or decode failure in a complete record
    Corruption,
    /// Incomplete record at the end of a data file
    TornTail,
}

impl StorageErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::WriteFailed => "LEDGER_STORAGE_WRITE_FAILED",
            StorageErrorCode::ReadFailed => "LEDGER_STORAGE_READ_FAILED",
            StorageErrorCode::Corruption => "LEDGER_STORAGE_CORRUPTION",
            StorageErrorCode::TornTail => "LEDGER_STORAGE_TORN_TAIL",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::Corruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error with code, context and underlying cause.
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    details: Option<String>,
    offset: Option<u64>,
    source: Option<io::Error>,
}

impl StorageError {
    fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            offset: None,
            source: None,
        }
    }

    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(StorageErrorCode::WriteFailed, message)
        }
    }

    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(StorageErrorCode::ReadFailed, message)
        }
    }

    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::Corruption, message)
    }

    /// Corruption of the record at `offset` in `file`
    pub fn corruption_at_offset(file: &str, offset: u64, reason: impl Into<String>) -> Self {
        Self {
            details: Some(format!("file: {}, byte_offset: {}", file, offset)),
            offset: Some(offset),
            ..Self::new(StorageErrorCode::Corruption, reason)
        }
    }

    /// Incomplete trailing record starting at `offset` in `file`
    pub fn torn_tail(file: &str, offset: u64, reason: impl Into<String>) -> Self {
        Self {
            details: Some(format!("file: {}, byte_offset: {}", file, offset)),
            offset: Some(offset),
            ..Self::new(StorageErrorCode::TornTail, reason)
        }
    }

    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn is_torn_tail(&self) -> bool {
        self.code == StorageErrorCode::TornTail
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
