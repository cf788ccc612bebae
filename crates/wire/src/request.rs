// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sluice_core::StepSpec;

/// Which steps an ingest should run.
///
/// Untagged: a JSON array of strings selects configured stages by name, an
/// array of objects is a full plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StepSelection {
    /// Configured stages by name, plus whatever they depend on. Empty means
    /// the whole configured pipeline.
    Names(Vec<String>),
    /// An explicit plan; every step must still have a registered adapter.
    Plan(Vec<StepSpec>),
}

impl Default for StepSelection {
    fn default() -> Self {
        StepSelection::Names(Vec::new())
    }
}

/// Request from CLI to daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Daemon status
    Status,

    /// Cancel every active job and stop the daemon
    Shutdown,

    /// Start ingesting a repository
    IngestStart {
        repository_path: PathBuf,
        #[serde(default)]
        steps: StepSelection,
        #[serde(default)]
        parameters: HashMap<String, String>,
        /// Client-chosen id; the daemon generates one when absent
        #[serde(default)]
        job_id: Option<String>,
    },

    /// Snapshot of one job
    IngestStatus { job_id: String },

    /// Request cancellation of one job
    IngestCancel { job_id: String },

    /// Block until the job finishes or the timeout passes
    IngestWait { job_id: String, timeout_ms: u64 },

    /// Summaries of every job in the table, newest first
    ListJobs,

    /// Token bucket snapshot
    ResourceStatus,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
