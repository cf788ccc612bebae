// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step registration spec and the per-step state machine.
//!
//! ```text
//! pending ──► running ──► completed
//!    │           │  └───► failed ──► pending   (retry, budget permitting)
//!    │           ├──────► stopped
//!    │           └──────► cancelled
//!    ├──► failed      (dependency propagation / deadlock / token timeout)
//!    └──► cancelled
//! ```
//!
//! Every mutation goes through a transition method; illegal moves return
//! [`TransitionError`] and leave the record untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a single step within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Stopped,
}

impl StepStatus {
    /// Terminal states admit no further automatic transition.
    ///
    /// `Failed` is only ever observable once retries are exhausted: the
    /// retry path moves a failed step back to `Pending` under the same lock.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Cancelled | StepStatus::Stopped
        )
    }
}

crate::simple_display! {
    StepStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        Stopped => "stopped",
    }
}

/// Errors from illegal state-machine moves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("step '{step}': cannot move from {from} to {to}")]
    Invalid { step: String, from: StepStatus, to: StepStatus },

    #[error("step '{step}': retry budget of {max_retries} exhausted")]
    RetriesExhausted { step: String, max_retries: u32 },
}

/// Registration-time description of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub back_off_secs: u64,
    /// Whether the step holds a resource token while it executes.
    #[serde(default = "default_uses_token")]
    pub uses_token: bool,
}

fn default_uses_token() -> bool {
    true
}

impl StepSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            max_retries: 0,
            back_off_secs: 0,
            uses_token: true,
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    crate::setters! {
        set {
            max_retries: u32,
            back_off_secs: u64,
            uses_token: bool,
        }
    }
}

/// Live state of one registered step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub dependencies: Vec<String>,
    pub status: StepStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub back_off_secs: u64,
    pub uses_token: bool,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
    /// Fraction in `0.0..=1.0` last reported by the adapter.
    pub progress: Option<f32>,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
}

impl From<&StepSpec> for StepRecord {
    fn from(spec: &StepSpec) -> Self {
        Self {
            name: spec.name.clone(),
            dependencies: spec.depends_on.clone(),
            status: StepStatus::Pending,
            retry_count: 0,
            max_retries: spec.max_retries,
            back_off_secs: spec.back_off_secs,
            uses_token: spec.uses_token,
            last_error: None,
            result: None,
            progress: None,
            started_at_ms: None,
            completed_at_ms: None,
        }
    }
}

impl StepRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn invalid(&self, to: StepStatus) -> TransitionError {
        TransitionError::Invalid { step: self.name.clone(), from: self.status, to }
    }

    fn expect_status(&self, allowed: &[StepStatus], to: StepStatus) -> Result<(), TransitionError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(self.invalid(to))
        }
    }

    /// `pending → running`. `started_at_ms` keeps the first attempt's start.
    pub fn start(&mut self, epoch_ms: u64) -> Result<(), TransitionError> {
        self.expect_status(&[StepStatus::Pending], StepStatus::Running)?;
        self.status = StepStatus::Running;
        self.started_at_ms.get_or_insert(epoch_ms);
        self.progress = None;
        Ok(())
    }

    /// `running → completed`. A successful attempt clears `last_error`.
    pub fn complete(
        &mut self,
        result: Option<serde_json::Value>,
        epoch_ms: u64,
    ) -> Result<(), TransitionError> {
        self.expect_status(&[StepStatus::Running], StepStatus::Completed)?;
        self.status = StepStatus::Completed;
        self.result = result;
        self.last_error = None;
        self.progress = Some(1.0);
        self.completed_at_ms = Some(epoch_ms);
        Ok(())
    }

    /// Record a failed attempt. Allowed from `pending` because a token
    /// timeout fails the attempt before the step ever runs.
    pub fn fail(&mut self, error: impl Into<String>, epoch_ms: u64) -> Result<(), TransitionError> {
        self.expect_status(&[StepStatus::Pending, StepStatus::Running], StepStatus::Failed)?;
        self.status = StepStatus::Failed;
        self.last_error = Some(error.into());
        self.completed_at_ms = Some(epoch_ms);
        Ok(())
    }

    /// `failed → pending` for another attempt, consuming one retry.
    /// `last_error` is kept until the retry resolves.
    pub fn retry(&mut self) -> Result<(), TransitionError> {
        self.expect_status(&[StepStatus::Failed], StepStatus::Pending)?;
        if self.retry_count >= self.max_retries {
            return Err(TransitionError::RetriesExhausted {
                step: self.name.clone(),
                max_retries: self.max_retries,
            });
        }
        self.retry_count += 1;
        self.status = StepStatus::Pending;
        self.completed_at_ms = None;
        Ok(())
    }

    /// Seal a failed step as terminal. The final attempt is counted, so an
    /// always-failing step ends with `retry_count == max_retries + 1`.
    pub fn exhaust(&mut self) -> Result<(), TransitionError> {
        self.expect_status(&[StepStatus::Failed], StepStatus::Failed)?;
        self.retry_count += 1;
        Ok(())
    }

    /// `pending → failed` because `ancestor` failed terminally.
    pub fn fail_from_dependency(
        &mut self,
        ancestor: &str,
        epoch_ms: u64,
    ) -> Result<(), TransitionError> {
        self.expect_status(&[StepStatus::Pending], StepStatus::Failed)?;
        self.status = StepStatus::Failed;
        self.last_error = Some(format!("dependency '{}' failed", ancestor));
        self.completed_at_ms = Some(epoch_ms);
        Ok(())
    }

    /// `pending | running → cancelled`.
    pub fn cancel(&mut self, epoch_ms: u64) -> Result<(), TransitionError> {
        self.expect_status(&[StepStatus::Pending, StepStatus::Running], StepStatus::Cancelled)?;
        self.status = StepStatus::Cancelled;
        self.completed_at_ms = Some(epoch_ms);
        Ok(())
    }

    /// `running → stopped` after the adapter accepted a stop request.
    pub fn stop(&mut self, epoch_ms: u64) -> Result<(), TransitionError> {
        self.expect_status(&[StepStatus::Running], StepStatus::Stopped)?;
        self.status = StepStatus::Stopped;
        self.completed_at_ms = Some(epoch_ms);
        Ok(())
    }

    /// Record adapter-reported progress while running; ignored otherwise.
    pub fn report_progress(&mut self, progress: Option<f32>) {
        if self.status == StepStatus::Running {
            if let Some(p) = progress {
                self.progress = Some(p.clamp(0.0, 1.0));
            }
        }
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
