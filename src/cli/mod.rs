//! CLI module
//!
//! Provides command-line interface for:
//! - serve: Open the ledger and serve the HTTP API
//! - ingest: Append episodes from a file or stdin
//! - export: Stream the ledger as NDJSON
//! - verify: Run recovery and re-validate stored episodes

mod args;
mod commands;
mod config;
mod errors;

pub use args::{Cli, Command, FilterArgs, StoreArgs};
pub use commands::{export, ingest, run, run_command, serve, verify, IngestReport, VerifyReport};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
