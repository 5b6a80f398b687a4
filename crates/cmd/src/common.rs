//! Shared plumbing for the weir subcommands.

use anyhow::{Result, anyhow};
use clap::Args;
use curator::{BatchOptions, BatchSummary};
use depot::{ClientFactory, FsDepot, ObjectPath};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};

/// Input/output and concurrency settings shared by every batch command.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// File of depot paths to process, one per line; stdin when omitted
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// File to write selected paths to; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of depot client connections
    #[arg(long, default_value_t = 1)]
    pub clients: usize,

    /// Number of worker tasks
    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    /// Retries of transient connection failures per path
    #[arg(long, default_value_t = 2)]
    pub retries: usize,
}

impl BatchArgs {
    pub fn options(&self) -> BatchOptions {
        BatchOptions {
            num_clients: self.clients,
            num_tasks: self.threads,
            retries: self.retries,
        }
    }
}

/// The depot root comes from the WEIR_DEPOT environment variable.
pub fn depot_factory() -> Result<Arc<dyn ClientFactory>> {
    let root = env::var("WEIR_DEPOT")
        .map_err(|_| anyhow!("WEIR_DEPOT environment variable not set"))?;
    let depot = FsDepot::open(PathBuf::from(&root))
        .map_err(|e| anyhow!("cannot open depot at '{}': {}", root, e))?;
    Ok(depot.factory())
}

pub fn parse_path(raw: &str) -> Result<ObjectPath> {
    ObjectPath::parse(raw).map_err(|e| anyhow!("{e}"))
}

pub async fn open_input(
    path: Option<&PathBuf>,
) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| anyhow!("cannot open input '{}': {}", path.display(), e))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

pub async fn open_output(
    path: Option<&PathBuf>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .map_err(|e| anyhow!("cannot create output '{}': {}", path.display(), e))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Print the summary and map it to the process exit code: failure when
/// any path errored.
pub fn finish(operation: &str, summary: BatchSummary) -> ExitCode {
    println!(
        "{operation}: processed={} passed={} repaired={} errors={}",
        summary.processed, summary.passed, summary.repaired, summary.errors
    );
    if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
