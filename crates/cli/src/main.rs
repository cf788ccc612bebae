// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `sluice`: command-line client for the ingestion daemon.

mod client;
mod color;
mod commands;
mod exit_error;
mod output;
mod table;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use client::DaemonClient;
use commands::{daemon, ingest, job};
use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "sluice", version, about = "Repository ingestion orchestrator", styles = color::styles())]
struct Cli {
    /// Output format
    #[arg(short = 'o', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start ingesting a repository (starts the daemon if needed)
    Ingest(ingest::IngestArgs),
    /// Show a job and its steps
    Status {
        /// Job ID
        id: String,
    },
    /// Request cancellation of a job
    Cancel {
        /// Job ID
        id: String,
    },
    /// Block until a job finishes; exit status reflects the outcome
    Wait {
        /// Job ID
        id: String,
        /// Timeout duration (e.g. "5m", "30s", "1h")
        #[arg(long)]
        timeout: Option<String>,
    },
    /// List retained jobs, newest first
    List,
    /// Show the shared token bucket
    Resources,
    /// Daemon management
    Daemon(daemon::DaemonArgs),
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.output;
    match cli.command {
        Commands::Ingest(args) => ingest::handle(args, format).await,
        Commands::Daemon(args) => daemon::daemon(args, format).await,
        Commands::Status { id } => job::status(&DaemonClient::connect()?, &id, format).await,
        Commands::Cancel { id } => job::cancel(&DaemonClient::connect()?, &id, format).await,
        Commands::Wait { id, timeout } => {
            let timeout = timeout.as_deref().map(job::parse_duration).transpose()?;
            let client = DaemonClient::connect()?;
            job::wait(&client, &id, timeout.unwrap_or(job::DEFAULT_WAIT), format).await
        }
        Commands::List => job::list(&DaemonClient::connect()?, format).await,
        Commands::Resources => job::resources(&DaemonClient::connect()?, format).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = e.to_string();
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            ExitCode::from(exit_error::exit_code(&e))
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
