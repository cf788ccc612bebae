// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job commands: `sluice status|cancel|wait|list|resources`

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use sluice_core::JobStatus;
use sluice_wire::{CancelState, JobDetail, JobSummary, ResourceSummary};

use crate::client::DaemonClient;
use crate::color;
use crate::exit_error::ExitError;
use crate::output::{
    format_duration_ms, format_or_json, format_time_ago, handle_list, OutputFormat,
};
use crate::table::{Column, Table};

/// Default for `sluice wait` without `--timeout`.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(600);

/// Parse a human-readable duration string (e.g. "5m", "30s", "1h30m")
pub fn parse_duration(s: &str) -> Result<Duration> {
    let mut total_secs: u64 = 0;
    let mut current_num = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            current_num.push(c);
        } else {
            let n: u64 =
                current_num.parse().map_err(|_| anyhow::anyhow!("invalid duration: {}", s))?;
            current_num.clear();
            match c {
                'h' => total_secs += n * 3600,
                'm' => total_secs += n * 60,
                's' => total_secs += n,
                _ => anyhow::bail!("unknown duration unit '{}' in: {}", c, s),
            }
        }
    }
    // Bare number → seconds
    if !current_num.is_empty() {
        let n: u64 = current_num.parse().map_err(|_| anyhow::anyhow!("invalid duration: {}", s))?;
        total_secs += n;
    }
    if total_secs == 0 {
        anyhow::bail!("duration must be > 0: {}", s);
    }
    Ok(Duration::from_secs(total_secs))
}

pub(crate) fn format_job_list(out: &mut (impl Write + ?Sized), jobs: &[JobSummary]) {
    let mut table = Table::new(vec![
        Column::muted("ID"),
        Column::left("REPOSITORY").with_max(40),
        Column::left("STEPS"),
        Column::left("CURRENT"),
        Column::left("CREATED"),
        Column::status("STATUS"),
    ]);
    for job in jobs {
        table.row(vec![
            job.job_id.clone(),
            job.repository_path.display().to_string(),
            format!("{}/{}", job.steps_completed, job.steps_total),
            job.current_step.clone().unwrap_or_else(|| "-".to_string()),
            format_time_ago(job.created_at_ms),
            job.status.to_string(),
        ]);
    }
    table.render(out);
}

pub(crate) fn format_job_detail(out: &mut (impl Write + ?Sized), job: &JobDetail) {
    let _ = writeln!(out, "{} {}", color::header("Job:"), job.job_id);
    let status = color::status(&job.status.to_string());
    let _ = writeln!(out, "  {} {}", color::context("Status:"), status);
    let _ = writeln!(out, "  {} {}", color::context("Repository:"), job.repository_path.display());
    let _ = writeln!(out, "  {} {}", color::context("Created:"), format_time_ago(job.created_at_ms));
    if job.cancel_requested && job.status == JobStatus::Running {
        let _ = writeln!(out, "  {} requested", color::context("Cancel:"));
    }
    if !job.parameters.is_empty() {
        let mut params: Vec<_> = job.parameters.iter().collect();
        params.sort();
        let _ = writeln!(out, "  {}", color::context("Parameters:"));
        for (key, value) in params {
            let _ = writeln!(out, "    {}={}", key, value);
        }
    }

    let _ = writeln!(out);
    let mut table = Table::new(vec![
        Column::left("STEP"),
        Column::left("PROGRESS"),
        Column::left("RETRIES"),
        Column::left("TIME"),
        Column::status("STATUS"),
    ]);
    for (name, step) in &job.steps {
        table.row(vec![
            name.clone(),
            step.progress.map(|p| format!("{:.0}%", p * 100.0)).unwrap_or_else(|| "-".into()),
            format!("{}/{}", step.retry_count, step.max_retries),
            format_duration_ms(step.started_at_ms, step.completed_at_ms),
            step.status.to_string(),
        ]);
    }
    table.render(out);

    for (name, step) in &job.steps {
        if let Some(error) = &step.last_error {
            let _ = writeln!(out, "  {} {}: {}", color::muted("error"), name, error);
        }
    }
}

pub(crate) fn format_resources(out: &mut (impl Write + ?Sized), resources: &ResourceSummary) {
    let _ = writeln!(out, "{} {}", color::header("Bucket:"), resources.bucket);
    let _ = writeln!(
        out,
        "  {} {}/{}",
        color::context("Available:"),
        resources.available_tokens,
        resources.max_tokens
    );
    let _ = writeln!(out, "  {} {}", color::context("Held here:"), resources.held_tokens);
}

pub async fn status(client: &DaemonClient, job_id: &str, format: OutputFormat) -> Result<()> {
    let job = client.job(job_id).await?;
    format_or_json(format, &job, || format_job_detail(&mut std::io::stdout(), &job))
}

pub async fn cancel(client: &DaemonClient, job_id: &str, format: OutputFormat) -> Result<()> {
    let state = client.cancel(job_id).await?;
    let obj = serde_json::json!({ "job_id": job_id, "state": state });
    format_or_json(format, &obj, || match state {
        CancelState::Cancelled => println!("Cancel requested: {}", job_id),
        CancelState::AlreadyTerminal => println!("Job {} already finished", job_id),
    })
}

/// Block until the job finishes, then report it.
///
/// The exit status follows the outcome: success only for `completed`.
pub async fn wait(
    client: &DaemonClient,
    job_id: &str,
    timeout: Duration,
    format: OutputFormat,
) -> Result<()> {
    let (finished, status) = client.wait(job_id, timeout).await?;
    if !finished {
        return Err(ExitError::timed_out(job_id).into());
    }
    let job = client.job(job_id).await?;
    format_or_json(format, &job, || format_job_detail(&mut std::io::stdout(), &job))?;
    match status {
        JobStatus::Completed => Ok(()),
        JobStatus::Failed => Err(ExitError::job_failed(job_id).into()),
        JobStatus::Cancelled => Err(ExitError::job_cancelled(job_id).into()),
        // `finished` implies terminal
        JobStatus::Running => Err(ExitError::timed_out(job_id).into()),
    }
}

pub async fn list(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let jobs = client.list_jobs().await?;
    handle_list(format, &jobs, "No jobs", |items, out| format_job_list(out, items))
}

pub async fn resources(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let resources = client.resources().await?;
    format_or_json(format, &resources, || format_resources(&mut std::io::stdout(), &resources))
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
