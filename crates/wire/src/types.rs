// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sluice_core::{Job, JobStatus, StepRecord, StepStatus};

/// Per-step view inside a [`JobDetail`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDetail {
    pub status: StepStatus,
    #[serde(default)]
    pub progress: Option<f32>,
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub started_at_ms: Option<u64>,
    #[serde(default)]
    pub completed_at_ms: Option<u64>,
}

impl From<&StepRecord> for StepDetail {
    fn from(record: &StepRecord) -> Self {
        Self {
            status: record.status,
            progress: record.progress,
            retry_count: record.retry_count,
            max_retries: record.max_retries,
            last_error: record.last_error.clone(),
            result: record.result.clone(),
            dependencies: record.dependencies.clone(),
            started_at_ms: record.started_at_ms,
            completed_at_ms: record.completed_at_ms,
        }
    }
}

/// Full job snapshot returned by `IngestStatus`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobDetail {
    pub job_id: String,
    pub status: JobStatus,
    pub repository_path: PathBuf,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    pub created_at_ms: u64,
    #[serde(default)]
    pub finished_at_ms: Option<u64>,
    #[serde(default)]
    pub cancel_requested: bool,
    /// Registration order is preserved.
    pub steps: IndexMap<String, StepDetail>,
}

impl From<&Job> for JobDetail {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status(),
            repository_path: job.repository_path.clone(),
            parameters: job.parameters.clone(),
            created_at_ms: job.created_at_ms,
            finished_at_ms: job.finished_at_ms,
            cancel_requested: job.cancel_requested,
            steps: job.steps.iter().map(|(name, record)| (name.clone(), record.into())).collect(),
        }
    }
}

/// One row of `ListJobs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub repository_path: PathBuf,
    pub created_at_ms: u64,
    pub steps_total: usize,
    pub steps_completed: usize,
    /// The step currently running, or the first failed one.
    #[serde(default)]
    pub current_step: Option<String>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        let current_step = job
            .steps
            .values()
            .find(|s| s.status == StepStatus::Running)
            .or_else(|| job.steps.values().find(|s| s.status == StepStatus::Failed))
            .map(|s| s.name.clone());
        Self {
            job_id: job.id.to_string(),
            status: job.status(),
            repository_path: job.repository_path.clone(),
            created_at_ms: job.created_at_ms,
            steps_total: job.steps.len(),
            steps_completed: job.steps.values().filter(|s| s.status == StepStatus::Completed).count(),
            current_step,
        }
    }
}

/// Token bucket snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceSummary {
    pub bucket: String,
    pub available_tokens: u32,
    pub max_tokens: u32,
    /// Grants held by steps of this daemon.
    #[serde(default)]
    pub held_tokens: u32,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
