// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only logger for per-job activity logs.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// `<log_dir>/job/<job_id>.log`
pub fn job_log_path(log_dir: &Path, job_id: &str) -> PathBuf {
    log_dir.join("job").join(format!("{}.log", job_id))
}

fn format_utc_now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Append-only logger for per-job activity logs.
///
/// Writes human-readable timestamped lines to `<log_dir>/job/<job_id>.log`.
/// Each `append()` call opens, writes, and closes the file, which is fine
/// for the handful of lines a step produces per attempt.
#[derive(Debug, Clone)]
pub struct JobLogger {
    log_dir: PathBuf,
}

impl JobLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into() }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Append a line for `step` of `job_id`.
    ///
    /// Format: `2026-01-30T08:14:09Z [step] message`. Multi-line messages
    /// (stage output, stderr) are written as a fenced block instead.
    ///
    /// Failures are traced and swallowed; logging must not break a job.
    pub fn append(&self, job_id: &str, step: &str, message: &str) {
        let path = job_log_path(&self.log_dir, job_id);
        let result = if message.contains('\n') {
            write_fenced(&path, step, message)
        } else {
            write_line(&path, step, message)
        };
        if let Err(e) = result {
            tracing::warn!(job_id, error = %e, "failed to write job log");
        }
    }
}

fn open(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn write_line(path: &Path, step: &str, message: &str) -> std::io::Result<()> {
    let mut file = open(path)?;
    writeln!(file, "{} [{}] {}", format_utc_now(), step, message)
}

fn write_fenced(path: &Path, step: &str, content: &str) -> std::io::Result<()> {
    let mut file = open(path)?;
    let ts = format_utc_now();
    writeln!(file, "{} [{}] ```", ts, step)?;
    write!(file, "{}", content)?;
    if !content.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{} [{}] ```", ts, step)
}

#[cfg(test)]
#[path = "job_logger_tests.rs"]
mod tests;
