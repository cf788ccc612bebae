// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job dependency scheduler.
//!
//! One [`JobRunner::run`] task per job. Each runnable step is dispatched
//! onto its own task in the job's `JoinSet`; that task owns the whole life
//! of the step: token acquisition, `run`, status polling, the stop hook,
//! and retry back-off. The loop itself only decides what is runnable and
//! waits for the next step task to finish.

use crate::config::EngineConfig;
use crate::controller::JobController;
use crate::job_logger::JobLogger;
use crate::retry::{RetryDecision, RetryPolicy, StepFailure};
use crate::tokens::{ResourceTokenManager, TokenError};
use parking_lot::Mutex;
use sluice_adapters::{StepAdapter, StepHandle, StepRegistry, StepState};
use sluice_core::{Clock, Job, JobId, StepStatus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Error recorded on every remaining step when the job can make no progress.
pub const DEADLOCK_ERROR: &str = "dependency cycle or missing dependencies";

/// How one dispatch of a step ended.
enum AttemptEnd {
    /// Step is terminal, or the job was cancelled.
    Done,
    /// Step is back to pending; try again after the delay.
    Retry(Duration),
}

/// Drives one job from registration to a terminal status.
#[derive(Clone)]
pub struct JobRunner<C: Clock> {
    job_id: JobId,
    job: Arc<Mutex<Job>>,
    cancel: CancellationToken,
    registry: Arc<StepRegistry>,
    tokens: Arc<ResourceTokenManager>,
    config: Arc<EngineConfig>,
    policy: RetryPolicy,
    clock: C,
    logger: Option<JobLogger>,
}

impl<C: Clock> JobRunner<C> {
    pub fn new(
        controller: &JobController,
        registry: Arc<StepRegistry>,
        tokens: Arc<ResourceTokenManager>,
        config: Arc<EngineConfig>,
        clock: C,
    ) -> Self {
        let logger = config.log_dir.clone().map(JobLogger::new);
        Self {
            job_id: controller.id().clone(),
            job: controller.job(),
            cancel: controller.cancel_token(),
            registry,
            tokens,
            policy: RetryPolicy::new(config.backoff),
            config,
            clock,
            logger,
        }
    }

    fn activity(&self, step: &str, message: &str) {
        tracing::debug!(job_id = %self.job_id, step, message);
        if let Some(logger) = &self.logger {
            logger.append(self.job_id.as_str(), step, message);
        }
    }

    /// Run the scheduling loop, then signal completion on `done`.
    pub async fn run(self, done: watch::Sender<bool>) {
        tracing::info!(job_id = %self.job_id, "job started");
        self.activity("job", "started");

        let mut in_flight: JoinSet<String> = JoinSet::new();
        let mut dispatched: HashSet<String> = HashSet::new();
        let mut cancel_seen = false;

        loop {
            let (runnable, remaining) = {
                let job = self.job.lock();
                (job.runnable(), job.remaining())
            };

            if remaining.is_empty() {
                while in_flight.join_next().await.is_some() {}
                break;
            }

            if !self.cancel.is_cancelled() {
                for name in runnable {
                    if dispatched.insert(name.clone()) {
                        let runner = self.clone();
                        in_flight.spawn(async move {
                            runner.drive_step(&name).await;
                            name
                        });
                    }
                }
            }

            if in_flight.is_empty() {
                if self.cancel.is_cancelled() {
                    self.cancel_leftovers(&remaining);
                } else {
                    self.fail_deadlocked(&remaining);
                }
                break;
            }

            tokio::select! {
                joined = in_flight.join_next() => match joined {
                    Some(Ok(name)) => {
                        dispatched.remove(&name);
                    }
                    Some(Err(e)) => {
                        tracing::error!(job_id = %self.job_id, error = %e, "step task aborted");
                    }
                    None => {}
                },
                _ = self.cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    tracing::info!(
                        job_id = %self.job_id,
                        in_flight = in_flight.len(),
                        "cancellation observed, draining running steps"
                    );
                }
            }
        }

        let status = {
            let mut job = self.job.lock();
            job.mark_finished(self.clock.epoch_ms());
            job.status()
        };
        tracing::info!(job_id = %self.job_id, %status, "job finished");
        self.activity("job", &format!("finished: {}", status));
        done.send_replace(true);
    }

    fn fail_deadlocked(&self, remaining: &[String]) {
        let now = self.clock.epoch_ms();
        {
            let mut job = self.job.lock();
            for name in remaining {
                if let Some(record) = job.step_mut(name) {
                    let _ = record.fail(DEADLOCK_ERROR, now);
                }
            }
        }
        tracing::error!(job_id = %self.job_id, steps = ?remaining, "{}", DEADLOCK_ERROR);
        for name in remaining {
            self.activity(name, &format!("failed: {}", DEADLOCK_ERROR));
        }
    }

    /// Anything still non-terminal once every step task has exited.
    fn cancel_leftovers(&self, remaining: &[String]) {
        let now = self.clock.epoch_ms();
        let mut job = self.job.lock();
        for name in remaining {
            if let Some(record) = job.step_mut(name) {
                let _ = record.cancel(now);
            }
        }
    }

    async fn drive_step(&self, name: &str) {
        let Some(adapter) = self.registry.get(name) else {
            self.settle_failure(name, StepFailure::terminal(format!("no adapter registered for step '{}'", name)));
            return;
        };
        loop {
            match self.attempt(name, adapter.as_ref()).await {
                AttemptEnd::Done => return,
                AttemptEnd::Retry(delay) => {
                    let woke = tokio::select! {
                        _ = tokio::time::sleep(delay) => true,
                        _ = self.cancel.cancelled() => false,
                    };
                    if !woke {
                        return;
                    }
                }
            }
        }
    }

    /// One attempt: token, start, run, poll, settle.
    async fn attempt(&self, name: &str, adapter: &dyn StepAdapter) -> AttemptEnd {
        let (uses_token, attempt, repository_path, params) = {
            let job = self.job.lock();
            let Some(record) = job.step(name) else {
                return AttemptEnd::Done;
            };
            if job.cancel_requested || record.status != StepStatus::Pending {
                return AttemptEnd::Done;
            }
            (record.uses_token, record.retry_count + 1, job.repository_path.clone(), job.parameters.clone())
        };

        let grant = if uses_token {
            match self.tokens.acquire_or_cancel(self.config.acquire_timeout, &self.cancel).await {
                Ok(grant) => Some(grant),
                Err(TokenError::Cancelled) => return AttemptEnd::Done,
                Err(e) => {
                    tracing::warn!(job_id = %self.job_id, step = name, attempt, error = %e, "resource token not acquired");
                    return self.settle_failure(name, StepFailure::transient(e.to_string()));
                }
            }
        } else {
            None
        };

        let started = {
            let mut job = self.job.lock();
            let now = self.clock.epoch_ms();
            !job.cancel_requested && job.step_mut(name).is_some_and(|r| r.start(now).is_ok())
        };
        if !started {
            if let Some(grant) = grant {
                self.tokens.release(grant).await;
            }
            return AttemptEnd::Done;
        }
        tracing::info!(job_id = %self.job_id, step = name, attempt, "step started");
        self.activity(name, &format!("started (attempt {})", attempt));

        let outcome = match adapter.run(&repository_path, &params).await {
            Ok(handle) => self.poll(name, adapter, &handle).await,
            Err(e) => Some(Err(StepFailure::transient(e.to_string()))),
        };

        if let Some(grant) = grant {
            self.tokens.release(grant).await;
        }

        let Some(outcome) = outcome else {
            // Stop hook accepted; the step is already recorded as stopped.
            self.activity(name, "stopped");
            return AttemptEnd::Done;
        };

        let now = self.clock.epoch_ms();
        let mut job = self.job.lock();
        if job.cancel_requested {
            if let Some(record) = job.step_mut(name) {
                let _ = record.cancel(now);
            }
            drop(job);
            tracing::info!(job_id = %self.job_id, step = name, "step finished after cancellation, result discarded");
            self.activity(name, "cancelled (finished after cancellation, result discarded)");
            return AttemptEnd::Done;
        }
        match outcome {
            Ok(result) => {
                if let Some(record) = job.step_mut(name) {
                    if let Err(e) = record.complete(result, now) {
                        tracing::warn!(job_id = %self.job_id, step = name, error = %e, "completion not recorded");
                    }
                }
                drop(job);
                tracing::info!(job_id = %self.job_id, step = name, attempt, "step completed");
                self.activity(name, "completed");
                AttemptEnd::Done
            }
            Err(failure) => {
                drop(job);
                self.settle_failure(name, failure)
            }
        }
    }

    /// Poll until the attempt ends. `None` means the stop hook accepted a
    /// cancellation and the step was recorded as stopped.
    async fn poll(
        &self,
        name: &str,
        adapter: &dyn StepAdapter,
        handle: &StepHandle,
    ) -> Option<Result<Option<serde_json::Value>, StepFailure>> {
        let mut stop_requested = false;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.cancel.cancelled(), if !stop_requested => {
                    stop_requested = true;
                    match adapter.stop(handle).await {
                        Ok(true) => {
                            let now = self.clock.epoch_ms();
                            let mut job = self.job.lock();
                            if let Some(record) = job.step_mut(name) {
                                let _ = record.stop(now);
                            }
                            return None;
                        }
                        Ok(false) => {
                            tracing::info!(job_id = %self.job_id, step = name, "no stop hook, letting step finish");
                        }
                        Err(e) => {
                            tracing::warn!(job_id = %self.job_id, step = name, error = %e, "stop request failed");
                        }
                    }
                    continue;
                }
            }

            match adapter.status(handle).await {
                Ok(report) => match report.state {
                    StepState::Running => {
                        let mut job = self.job.lock();
                        if let Some(record) = job.step_mut(name) {
                            record.report_progress(report.progress);
                        }
                    }
                    StepState::Completed => return Some(Ok(report.result)),
                    StepState::Failed => {
                        let message = report.error.unwrap_or_else(|| "step failed".to_string());
                        return Some(Err(StepFailure { message, retryable: report.retryable }));
                    }
                },
                Err(e) => return Some(Err(StepFailure::transient(e.to_string()))),
            }
        }
    }

    /// Apply the retry policy to a failed attempt under the job lock.
    fn settle_failure(&self, name: &str, failure: StepFailure) -> AttemptEnd {
        let now = self.clock.epoch_ms();
        let decision = {
            let mut job = self.job.lock();
            if job.cancel_requested {
                if let Some(record) = job.step_mut(name) {
                    let _ = record.cancel(now);
                }
                return AttemptEnd::Done;
            }
            self.policy.apply_failure(&mut job, name, &failure, now)
        };
        match decision {
            Ok(RetryDecision::Retry { delay }) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    step = name,
                    error = %failure.message,
                    delay_secs = delay.as_secs(),
                    "step failed, retrying"
                );
                self.activity(name, &format!("failed: {}", failure.message));
                self.activity(name, &format!("retrying in {}s", delay.as_secs()));
                AttemptEnd::Retry(delay)
            }
            Ok(RetryDecision::Exhausted) => {
                tracing::error!(job_id = %self.job_id, step = name, error = %failure.message, "step failed permanently");
                self.activity(name, &format!("failed permanently: {}", failure.message));
                AttemptEnd::Done
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, step = name, error = %e, "failure not recorded");
                AttemptEnd::Done
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
