// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use sluice_core::JobStatus;

use super::{JobDetail, JobSummary, ResourceSummary};

/// What a cancel request did to a known job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelState {
    /// Cancellation is requested (now or earlier).
    Cancelled,
    /// The job had already finished; nothing changed.
    AlreadyTerminal,
}

/// Response from daemon to CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Daemon is shutting down
    ShuttingDown,

    /// Daemon status
    Status { uptime_secs: u64, jobs_active: usize, jobs_total: usize },

    /// Request was rejected before any work started
    Invalid { message: String },

    /// No job with this id
    NotFound { job_id: String },

    /// Error response
    Error { message: String },

    /// Ingest accepted and scheduled
    JobStarted { job_id: String },

    /// Single job snapshot
    Job { job: Box<JobDetail> },

    /// List of jobs, newest first
    Jobs { jobs: Vec<JobSummary> },

    /// Cancel acknowledged
    Cancel { job_id: String, state: CancelState },

    /// Wait result; `finished` is false when the timeout passed first
    Waited { job_id: String, finished: bool, status: JobStatus },

    /// Token bucket snapshot
    Resources { resources: ResourceSummary },
}
