// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use std::fmt;

use crate::client::ClientError;

/// The job finished in `failed`.
pub const JOB_FAILED: u8 = 1;
/// The job finished in `cancelled`.
pub const JOB_CANCELLED: u8 = 2;
pub const NOT_FOUND: u8 = 3;
/// The daemon rejected the request as invalid.
pub const INVALID: u8 = 4;
/// The daemon is not running.
pub const NOT_RUNNING: u8 = 69;
/// Same code as coreutils `timeout`.
pub const TIMED_OUT: u8 = 124;

#[derive(Debug)]
pub struct ExitError {
    pub code: u8,
    pub message: String,
}

impl ExitError {
    pub fn new(code: u8, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn job_failed(job_id: &str) -> Self {
        Self::new(JOB_FAILED, format!("job {} failed", job_id))
    }

    pub fn job_cancelled(job_id: &str) -> Self {
        Self::new(JOB_CANCELLED, format!("job {} was cancelled", job_id))
    }

    pub fn timed_out(job_id: &str) -> Self {
        Self::new(TIMED_OUT, format!("timed out waiting for job {}", job_id))
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

/// Process exit code for an error bubbled up to `main`.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        return exit.code;
    }
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::NotFound(_)) => NOT_FOUND,
        Some(ClientError::Invalid(_)) => INVALID,
        Some(ClientError::NotRunning) => NOT_RUNNING,
        _ => 1,
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
