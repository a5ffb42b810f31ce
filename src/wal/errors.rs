//! WAL error types
//!
//! Error codes:
//! - LEDGER_WAL_APPEND_FAILED (ERROR severity)
//! - LEDGER_WAL_FSYNC_FAILED (FATAL severity)
//! - LEDGER_WAL_CORRUPTION (FATAL severity)
//! - LEDGER_WAL_TORN_TAIL (ERROR severity, repaired by truncation at open)

use std::fmt;
use std::io;

/// Severity levels for low-level I/O errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the process continues
    Error,
    /// The ledger cannot continue safely
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// WAL-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalErrorCode {
    /// WAL write failed
    AppendFailed,
    /// WAL fsync failed
    FsyncFailed,
    /// Checksum or structural failure in a complete record
    Corruption,
    /// Incomplete record at the end of the log
    TornTail,
}

impl WalErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            WalErrorCode::AppendFailed => "LEDGER_WAL_APPEND_FAILED",
            WalErrorCode::FsyncFailed => "LEDGER_WAL_FSYNC_FAILED",
            WalErrorCode::Corruption => "LEDGER_WAL_CORRUPTION",
            WalErrorCode::TornTail => "LEDGER_WAL_TORN_TAIL",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            WalErrorCode::AppendFailed => Severity::Error,
            WalErrorCode::FsyncFailed => Severity::Fatal,
            WalErrorCode::Corruption => Severity::Fatal,
            WalErrorCode::TornTail => Severity::Error,
        }
    }
}

impl fmt::Display for WalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// WAL error with code, context and underlying cause.
#[derive(Debug)]
pub struct WalError {
    code: WalErrorCode,
    message: String,
    details: Option<String>,
    /// Byte offset of the offending record, when known
    offset: Option<u64>,
    source: Option<io::Error>,
}

impl WalError {
    fn new(code: WalErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            offset: None,
            source: None,
        }
    }

    pub fn append_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(WalErrorCode::AppendFailed, message)
        }
    }

    pub fn fsync_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(WalErrorCode::FsyncFailed, message)
        }
    }

    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(WalErrorCode::Corruption, message)
    }

    /// Corruption with sequence number context
    pub fn corruption_at_sequence(sequence: u64, reason: impl Into<String>) -> Self {
        Self {
            details: Some(format!("sequence_number: {}", sequence)),
            ..Self::new(WalErrorCode::Corruption, reason)
        }
    }

    /// Corruption with byte offset context
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            details: Some(format!("byte_offset: {}", offset)),
            offset: Some(offset),
            ..Self::new(WalErrorCode::Corruption, reason)
        }
    }

    /// Incomplete trailing record starting at `offset`
    pub fn torn_tail(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            details: Some(format!("byte_offset: {}", offset)),
            offset: Some(offset),
            ..Self::new(WalErrorCode::TornTail, reason)
        }
    }

    pub fn code(&self) -> WalErrorCode {
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
        self.code == WalErrorCode::TornTail
    }
}

impl fmt::Display for WalError {
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

impl std::error::Error for WalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for WAL operations
pub type WalResult<T> = Result<T, WalError>;
