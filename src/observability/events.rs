//! Ledger lifecycle events
//!
//! Every structured log line carries one of these as its `event` field so
//! logs can be filtered by a stable code rather than by message text.

use std::fmt;

/// Observable events in the episode ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Ledger open begins
    LedgerOpenBegin,
    /// Ledger open complete, ready to serve
    LedgerOpenComplete,
    /// Ledger closed after a final fsync
    LedgerClosed,
    /// Configuration loaded
    ConfigLoaded,
    /// HTTP listener bound
    Serving,

    // Recovery
    /// Recovery started
    RecoveryBegin,
    /// Index rebuilt from the episode data file
    IndexRebuildComplete,
    /// WAL records past the data files re-applied
    WalReplayComplete,
    /// Incomplete trailing WAL record removed
    WalTailTruncated,
    /// Incomplete trailing episode record removed
    DataTailTruncated,
    /// Checksum mismatch in a complete record (FATAL)
    CorruptionDetected,

    // Writes
    /// Episode durably committed and published
    EpisodeCommitted,
    /// Episode refused (validation or conflict)
    EpisodeRejected,
    /// Writer stopped after a failure past the WAL append (FATAL)
    LedgerHalted,

    // Export
    /// Export stream opened
    ExportBegin,
    /// Export stream drained
    ExportComplete,
    /// Export consumer went away mid-stream
    ExportCancelled,
}

impl Event {
    /// Returns the event code
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::LedgerOpenBegin => "LEDGER_OPEN_BEGIN",
            Event::LedgerOpenComplete => "LEDGER_OPEN_COMPLETE",
            Event::LedgerClosed => "LEDGER_CLOSED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "SERVING",
            Event::RecoveryBegin => "RECOVERY_BEGIN",
            Event::IndexRebuildComplete => "INDEX_REBUILD_COMPLETE",
            Event::WalReplayComplete => "WAL_REPLAY_COMPLETE",
            Event::WalTailTruncated => "WAL_TAIL_TRUNCATED",
            Event::DataTailTruncated => "DATA_TAIL_TRUNCATED",
            Event::CorruptionDetected => "CORRUPTION_DETECTED",
            Event::EpisodeCommitted => "EPISODE_COMMITTED",
            Event::EpisodeRejected => "EPISODE_REJECTED",
            Event::LedgerHalted => "LEDGER_HALTED",
            Event::ExportBegin => "EXPORT_BEGIN",
            Event::ExportComplete => "EXPORT_COMPLETE",
            Event::ExportCancelled => "EXPORT_CANCELLED",
        }
    }

    /// Returns true if this event means the ledger can no longer accept writes
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::CorruptionDetected | Event::LedgerHalted)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
