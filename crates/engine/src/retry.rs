// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry/back-off decisions and failure propagation to dependents.

use crate::config::BackoffMode;
use sluice_core::{Job, StepRecord, StepStatus, TransitionError};
use std::time::Duration;

/// Why an attempt failed. Recorded on the step, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub message: String,
    pub retryable: bool,
}

impl StepFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: true }
    }

    /// The stage reported the failure as permanent.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    Exhausted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    mode: BackoffMode,
}

impl RetryPolicy {
    pub fn new(mode: BackoffMode) -> Self {
        Self { mode }
    }

    /// Decide what happens after `step` fails with `failure`.
    pub fn decide(&self, step: &StepRecord, failure: &StepFailure) -> RetryDecision {
        if !failure.retryable || step.retry_count >= step.max_retries {
            return RetryDecision::Exhausted;
        }
        RetryDecision::Retry { delay: self.delay(step.back_off_secs, step.retry_count + 1) }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, back_off_secs: u64, retry: u32) -> Duration {
        let secs = match self.mode {
            BackoffMode::Fixed => back_off_secs,
            BackoffMode::Linear => back_off_secs.saturating_mul(u64::from(retry)),
        };
        Duration::from_secs(secs)
    }

    /// Record a failed attempt of `step` and settle it.
    ///
    /// On `Retry` the step is back to `pending` with its retry counted. On
    /// `Exhausted` it is terminally failed and its dependents have been
    /// failed too. Both happen under the caller's job lock, so the
    /// intermediate `failed` state is never observed.
    pub fn apply_failure(
        &self,
        job: &mut Job,
        step: &str,
        failure: &StepFailure,
        epoch_ms: u64,
    ) -> Result<RetryDecision, TransitionError> {
        let Some(record) = job.step_mut(step) else {
            return Ok(RetryDecision::Exhausted);
        };
        let decision = self.decide(record, failure);
        record.fail(failure.message.clone(), epoch_ms)?;
        match decision {
            RetryDecision::Retry { .. } => record.retry()?,
            RetryDecision::Exhausted => {
                record.exhaust()?;
                propagate_failure(job, step, epoch_ms);
            }
        }
        Ok(decision)
    }
}

/// Fail every pending transitive dependent of `failed`, naming it as the
/// cause. Returns the names that were failed.
pub fn propagate_failure(job: &mut Job, failed: &str, epoch_ms: u64) -> Vec<String> {
    let mut affected = Vec::new();
    for name in job.dependents_of(failed) {
        if let Some(record) = job.step_mut(&name) {
            if record.status == StepStatus::Pending
                && record.fail_from_dependency(failed, epoch_ms).is_ok()
            {
                affected.push(name);
            }
        }
    }
    affected
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
