//! CLI argument definitions using clap
//!
//! Commands:
//! - episode-ledger serve [--db-path <dir>] [--host <host>] [--port <port>] [--config <file>]
//! - episode-ledger ingest [--db-path <dir>] <file|->
//! - episode-ledger export [--db-path <dir>] [--output <file>] [filters]
//! - episode-ledger verify [--db-path <dir>]

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::model::EpisodeStatus;
use crate::observability::LogFormat;
use crate::query::ListFilter;

/// Append-only, replayable ledger of agent task episodes
#[derive(Parser, Debug)]
#[command(name = "episode-ledger")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the ledger and serve the HTTP API
    Serve {
        #[command(flatten)]
        store: StoreArgs,

        /// Address to bind
        #[arg(long, env = "EPISODE_HOST")]
        host: Option<String>,

        /// Port to bind
        #[arg(long, env = "EPISODE_PORT")]
        port: Option<u16>,
    },

    /// Ingest episodes from a JSON file, a JSON array or NDJSON
    Ingest {
        #[command(flatten)]
        store: StoreArgs,

        /// Input file, or "-" for stdin
        input: PathBuf,
    },

    /// Write the ledger as NDJSON
    Export {
        #[command(flatten)]
        store: StoreArgs,

        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Run recovery and re-validate every stored episode
    Verify {
        #[command(flatten)]
        store: StoreArgs,
    },
}

/// Where the ledger lives.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Data directory
    #[arg(long, env = "EPISODE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Path to JSON configuration file
    #[arg(long, env = "EPISODE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Export filters; same semantics as the list filters.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub agent_id: Option<String>,

    #[arg(long)]
    pub status: Option<EpisodeStatus>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub tool: Option<String>,

    /// Inclusive lower bound on created_at (RFC 3339)
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Inclusive upper bound on created_at (RFC 3339)
    #[arg(long)]
    pub until: Option<DateTime<Utc>>,
}

impl FilterArgs {
    /// `None` when no filter was given, so export walks the whole ledger.
    pub fn to_filter(&self) -> Option<ListFilter> {
        let filter = ListFilter {
            agent_id: self.agent_id.clone(),
            status: self.status,
            model: self.model.clone(),
            provider: self.provider.clone(),
            tool: self.tool.clone(),
            since: self.since,
            until: self.until,
            ..ListFilter::default()
        };
        (filter != ListFilter::default()).then_some(filter)
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
