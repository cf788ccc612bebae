// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier, record, and derived job status.

use crate::step::{StepRecord, StepSpec, StepStatus};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for one ingestion run.
    ///
    /// Generated as `job-<nanoid>` unless the client supplies its own.
    pub struct JobId("job-");
}

/// Opaque key/value parameters handed to every step of a job.
pub type Params = HashMap<String, String>;

/// Job-level status, always derived from the step records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Derive the job status from its steps.
    ///
    /// Precedence: any terminally failed step, then all completed, then a
    /// requested cancellation with nothing still running, else running.
    pub fn derive<'a>(
        steps: impl IntoIterator<Item = &'a StepRecord>,
        cancel_requested: bool,
    ) -> Self {
        let mut all_completed = true;
        let mut any_running = false;
        for step in steps {
            match step.status {
                StepStatus::Failed => return JobStatus::Failed,
                StepStatus::Completed => {}
                StepStatus::Running => {
                    all_completed = false;
                    any_running = true;
                }
                _ => all_completed = false,
            }
        }
        if all_completed {
            JobStatus::Completed
        } else if cancel_requested && !any_running {
            JobStatus::Cancelled
        } else {
            JobStatus::Running
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

crate::simple_display! {
    JobStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// One ingestion run and the records of all its steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub repository_path: PathBuf,
    pub parameters: Params,
    pub created_at_ms: u64,
    pub cancel_requested: bool,
    /// Set once, when the derived status first becomes terminal.
    pub finished_at_ms: Option<u64>,
    /// Step records in registration order.
    pub steps: IndexMap<String, StepRecord>,
}

impl Job {
    /// Build a job from an already validated plan.
    pub fn new(
        id: JobId,
        repository_path: impl Into<PathBuf>,
        parameters: Params,
        specs: &[StepSpec],
        created_at_ms: u64,
    ) -> Self {
        Self {
            id,
            repository_path: repository_path.into(),
            parameters,
            created_at_ms,
            cancel_requested: false,
            finished_at_ms: None,
            steps: specs.iter().map(|s| (s.name.clone(), StepRecord::from(s))).collect(),
        }
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::derive(self.steps.values(), self.cancel_requested)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.get(name)
    }

    pub fn step_mut(&mut self, name: &str) -> Option<&mut StepRecord> {
        self.steps.get_mut(name)
    }

    /// Names of steps not yet in a terminal state.
    pub fn remaining(&self) -> Vec<String> {
        self.steps.values().filter(|s| !s.is_terminal()).map(|s| s.name.clone()).collect()
    }

    /// Pending steps whose every dependency has completed.
    pub fn runnable(&self) -> Vec<String> {
        self.steps
            .values()
            .filter(|s| s.status == StepStatus::Pending)
            .filter(|s| {
                s.dependencies.iter().all(|d| {
                    self.steps.get(d).is_some_and(|dep| dep.status == StepStatus::Completed)
                })
            })
            .map(|s| s.name.clone())
            .collect()
    }

    /// Every step that depends on `name` directly or transitively, in
    /// registration order.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        let mut found: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([name]);
        while let Some(current) = queue.pop_front() {
            for step in self.steps.values() {
                if step.dependencies.iter().any(|d| d == current) && found.insert(step.name.as_str())
                {
                    queue.push_back(step.name.as_str());
                }
            }
        }
        self.steps.keys().filter(|k| found.contains(k.as_str())).cloned().collect()
    }

    /// Flag the job as cancelled and cancel every pending step.
    ///
    /// Returns the names of steps still running; those are stopped by the
    /// scheduler. Idempotent.
    pub fn request_cancel(&mut self, epoch_ms: u64) -> Vec<String> {
        self.cancel_requested = true;
        let mut running = Vec::new();
        for step in self.steps.values_mut() {
            match step.status {
                StepStatus::Pending => {
                    // Pending -> cancelled is always legal
                    let _ = step.cancel(epoch_ms);
                }
                StepStatus::Running => running.push(step.name.clone()),
                _ => {}
            }
        }
        self.mark_finished(epoch_ms);
        running
    }

    /// Stamp `finished_at_ms` the first time the job is terminal.
    pub fn mark_finished(&mut self, epoch_ms: u64) {
        if self.finished_at_ms.is_none() && self.is_terminal() {
            self.finished_at_ms = Some(epoch_ms);
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
