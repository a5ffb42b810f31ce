//! CLI command implementations
//!
//! Each command opens the ledger once, runs recovery as part of the open,
//! does its work, and closes the ledger with a final fsync.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::engine::EpisodeStore;
use crate::export::write_ndjson;
use crate::http_server::HttpServer;
use crate::model::{EpisodeDocument, EpisodeId};
use crate::observability::{init_tracing, Event};
use crate::query::ListFilter;
use crate::schema::validate_payload;

use super::args::{Cli, Command};
use super::config::Config;
use super::errors::{CliError, CliResult};

/// Outcome of `ingest`
#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub ingested: usize,
    pub ids: Vec<EpisodeId>,
}

/// Outcome of `verify`
#[derive(Debug, Serialize)]
pub struct VerifyReport {
    pub episodes: usize,
    pub wal_records: usize,
    pub wal_records_replayed: usize,
    pub wal_tail_truncated: bool,
    pub data_tail_truncated: bool,
    pub last_commit: u64,
}

/// Parse arguments, install logging and run the chosen command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.log_format);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { store, host, port } => {
            let config = loaded(Config::resolve(&store, host, port)?);
            serve(&config)
        }
        Command::Ingest { store, input } => {
            let config = loaded(Config::resolve(&store, None, None)?);
            let report = ingest(&config.data_dir, &input)?;
            print_json(&report)
        }
        Command::Export {
            store,
            output,
            filter,
        } => {
            let config = loaded(Config::resolve(&store, None, None)?);
            export(&config.data_dir, output.as_deref(), filter.to_filter().as_ref()).map(|_| ())
        }
        Command::Verify { store } => {
            let config = loaded(Config::resolve(&store, None, None)?);
            let report = verify(&config.data_dir)?;
            print_json(&report)
        }
    }
}

/// Open the ledger and serve HTTP until interrupted.
pub fn serve(config: &Config) -> CliResult<()> {
    let store = Arc::new(open_store(&config.data_dir)?);
    let server = HttpServer::new(config.http_config(), Arc::clone(&store));

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(server.start())
        .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))?;
    drop(rt);

    match Arc::try_unwrap(store) {
        Ok(store) => store.close().map_err(CliError::from),
        Err(_) => {
            warn!("ledger still referenced at shutdown; skipping final fsync");
            Ok(())
        }
    }
}

/// Ingest every episode in `input`, stopping at the first rejection.
///
/// Episodes committed before a rejection stay committed.
pub fn ingest(data_dir: &Path, input: &Path) -> CliResult<IngestReport> {
    let text = read_input(input)?;
    let payloads = parse_payloads(&text)?;
    let store = open_store(data_dir)?;

    let mut ids = Vec::with_capacity(payloads.len());
    for (position, payload) in payloads.iter().enumerate() {
        let draft = validate_payload(payload).map_err(|e| {
            CliError::invalid_input(format!(
                "episode {} rejected after {} ingested: {}",
                position,
                ids.len(),
                e
            ))
        })?;
        let episode = store.put(draft).map_err(|e| {
            if e.is_fatal() {
                CliError::io_error(e.to_string())
            } else {
                CliError::invalid_input(format!(
                    "episode {} rejected after {} ingested: {}",
                    position,
                    ids.len(),
                    e
                ))
            }
        })?;
        ids.push(episode.id);
    }

    store.close()?;
    Ok(IngestReport {
        ingested: ids.len(),
        ids,
    })
}

/// Write the ledger, or the episodes matching `filter`, as NDJSON.
///
/// Returns the number of records written.
pub fn export(data_dir: &Path, output: Option<&Path>, filter: Option<&ListFilter>) -> CliResult<usize> {
    let store = open_store(data_dir)?;

    let count = match output {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                CliError::io_error(format!("Failed to create {}: {}", path.display(), e))
            })?;
            let mut out = BufWriter::new(file);
            write_ndjson(&store, filter, &mut out)?
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            write_ndjson(&store, filter, &mut out)?
        }
    };

    store.close()?;
    Ok(count)
}

/// Run recovery, then re-read and re-validate every stored episode.
pub fn verify(data_dir: &Path) -> CliResult<VerifyReport> {
    let store = open_store(data_dir)?;
    let recovery = store.recovery_report().clone();

    let mut episodes = 0;
    let mut invalid = Vec::new();
    let stream = store
        .stream_all()
        .map_err(|e| CliError::verify_failed(e.to_string()))?;
    for episode in stream {
        let episode = episode.map_err(|e| CliError::verify_failed(e.to_string()))?;
        episodes += 1;

        let id = episode.id.clone();
        let payload = serde_json::to_value(EpisodeDocument::from(episode))?;
        if let Err(e) = validate_payload(&payload) {
            invalid.push(format!("{}: {}", id, e));
        }
    }

    store.close()?;

    if !invalid.is_empty() {
        return Err(CliError::verify_failed(format!(
            "{} of {} episodes failed validation: {}",
            invalid.len(),
            episodes,
            invalid.join("; ")
        )));
    }

    Ok(VerifyReport {
        episodes,
        wal_records: recovery.wal_records,
        wal_records_replayed: recovery.wal_records_replayed,
        wal_tail_truncated: recovery.wal_tail_truncated,
        data_tail_truncated: recovery.data_tail_truncated,
        last_commit: recovery.last_commit,
    })
}

fn loaded(config: Config) -> Config {
    info!(
        event = %Event::ConfigLoaded,
        data_dir = %config.data_dir.display(),
        host = %config.host,
        port = config.port,
        "configuration loaded"
    );
    config
}

fn open_store(data_dir: &Path) -> CliResult<EpisodeStore> {
    EpisodeStore::open(data_dir).map_err(|e| {
        CliError::boot_failed(format!("Failed to open ledger at {}: {}", data_dir.display(), e))
    })
}

fn read_input(input: &Path) -> CliResult<String> {
    if input == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }

    fs::read_to_string(input)
        .map_err(|e| CliError::io_error(format!("Failed to read {}: {}", input.display(), e)))
}

/// Accepts one JSON document (an object or an array of objects) or NDJSON.
fn parse_payloads(text: &str) -> CliResult<Vec<Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(value) => Ok(vec![value]),
        Err(_) => text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .map_err(|e| CliError::invalid_input(format!("line {}: {}", n + 1, e)))
            })
            .collect(),
    }
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
