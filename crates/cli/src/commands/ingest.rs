// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sluice ingest` - Start ingesting a repository

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use sluice_wire::StepSelection;

use super::job::{self, parse_duration, DEFAULT_WAIT};
use crate::client::DaemonClient;
use crate::output::{format_or_json, OutputFormat};

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Repository to ingest
    pub path: PathBuf,

    /// Run only this stage and what it depends on (can be repeated)
    #[arg(long = "step")]
    pub steps: Vec<String>,

    /// Parameters passed to every step (can be repeated: --param key=value)
    #[arg(long = "param", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Use this job id instead of a generated one
    #[arg(long)]
    pub job_id: Option<String>,

    /// Block until the job finishes
    #[arg(long)]
    pub wait: bool,

    /// How long to wait (e.g. "5m", "30s", "1h")
    #[arg(long, requires = "wait")]
    pub timeout: Option<String>,
}

pub(crate) fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos =
        s.find('=').ok_or_else(|| format!("invalid input format '{}': must be key=value", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Resolve the path against the caller's working directory; the daemon
/// runs steps with a different cwd.
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

pub async fn handle(args: IngestArgs, format: OutputFormat) -> Result<()> {
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?.unwrap_or(DEFAULT_WAIT);
    let repository_path = absolute(&args.path)?;
    let parameters: HashMap<String, String> = args.params.into_iter().collect();

    let client = DaemonClient::connect_or_start().await?;
    let job_id = client
        .ingest(repository_path, StepSelection::Names(args.steps), parameters, args.job_id)
        .await?;

    if args.wait {
        return job::wait(&client, &job_id, timeout, format).await;
    }
    let obj = serde_json::json!({ "job_id": &job_id });
    format_or_json(format, &obj, || println!("Job started: {}", job_id))
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
