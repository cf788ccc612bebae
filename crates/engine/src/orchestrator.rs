// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control surface: start, status, cancel, wait, list, resource status.

use crate::config::EngineConfig;
use crate::controller::{CancelOutcome, JobController};
use crate::scheduler::JobRunner;
use crate::tokens::{ResourceTokenManager, TokenError, TokenStatus};
use indexmap::IndexMap;
use parking_lot::Mutex;
use sluice_adapters::{CounterStore, StepRegistry};
use sluice_core::{validate_plan, Clock, Job, JobId, Params, StepSpec, SystemClock, ValidationError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to start one ingestion job.
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub repository_path: PathBuf,
    pub steps: Vec<StepSpec>,
    pub parameters: Params,
    /// Client-chosen id; generated when absent.
    pub job_id: Option<JobId>,
}

impl StartRequest {
    pub fn new(repository_path: impl Into<PathBuf>, steps: Vec<StepSpec>) -> Self {
        Self { repository_path: repository_path.into(), steps, parameters: Params::new(), job_id: None }
    }

    pub fn parameters(mut self, parameters: Params) -> Self {
        self.parameters = parameters;
        self
    }

    sluice_core::setters! {
        option {
            job_id: JobId,
        }
    }
}

/// Owns the job table and wires new jobs to the shared token manager.
pub struct Orchestrator<C: Clock = SystemClock> {
    config: Arc<EngineConfig>,
    registry: Arc<StepRegistry>,
    tokens: Arc<ResourceTokenManager>,
    clock: C,
    jobs: Mutex<IndexMap<JobId, JobController>>,
}

impl Orchestrator<SystemClock> {
    pub fn new(config: EngineConfig, registry: StepRegistry, store: Arc<dyn CounterStore>) -> Self {
        Self::with_clock(config, registry, store, SystemClock)
    }
}

impl<C: Clock> Orchestrator<C> {
    pub fn with_clock(
        config: EngineConfig,
        registry: StepRegistry,
        store: Arc<dyn CounterStore>,
        clock: C,
    ) -> Self {
        let tokens = Arc::new(ResourceTokenManager::new(store, &config));
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            tokens,
            clock,
            jobs: Mutex::new(IndexMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn tokens(&self) -> &Arc<ResourceTokenManager> {
        &self.tokens
    }

    /// Create the token bucket if this is the first process to use it.
    pub async fn initialize(&self) -> Result<(), TokenError> {
        self.tokens.initialize().await
    }

    /// Validate and register a job, spawn its scheduler, return its id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, request: StartRequest) -> Result<JobId, ValidationError> {
        if request.repository_path.as_os_str().is_empty() {
            return Err(ValidationError::EmptyRepositoryPath);
        }
        validate_plan(&request.steps)?;
        if let Some(unknown) = request.steps.iter().find(|s| !self.registry.contains(&s.name)) {
            return Err(ValidationError::UnknownStep(unknown.name.clone()));
        }

        let id = request.job_id.filter(|id| !id.is_empty()).unwrap_or_default();
        // Ids name log files on disk.
        if !id.as_str().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(ValidationError::InvalidJobId(id.to_string()));
        }
        let job = Job::new(
            id.clone(),
            request.repository_path,
            request.parameters,
            &request.steps,
            self.clock.epoch_ms(),
        );
        let (controller, done) = JobController::new(job);

        {
            let mut jobs = self.jobs.lock();
            if jobs.get(&id).is_some_and(|existing| !existing.is_done()) {
                return Err(ValidationError::JobAlreadyActive(id.to_string()));
            }
            // A finished job with the same id is replaced; move it to the end
            // so listing order stays by start time.
            jobs.shift_remove(&id);
            jobs.insert(id.clone(), controller.clone());
        }

        let runner = JobRunner::new(
            &controller,
            Arc::clone(&self.registry),
            Arc::clone(&self.tokens),
            Arc::clone(&self.config),
            self.clock.clone(),
        );
        tokio::spawn(runner.run(done));

        tracing::info!(job_id = %id, steps = request.steps.len(), "job registered");
        Ok(id)
    }

    fn controller(&self, id: &str) -> Option<JobController> {
        self.jobs.lock().get(id).cloned()
    }

    /// Snapshot of the job, or `None` if unknown.
    pub fn status(&self, id: &str) -> Option<Job> {
        self.controller(id).map(|c| c.snapshot())
    }

    pub fn cancel(&self, id: &str) -> CancelOutcome {
        match self.controller(id) {
            Some(controller) => controller.cancel(self.clock.epoch_ms()),
            None => CancelOutcome::NotFound,
        }
    }

    /// Wait for the job to finish. `None` if unknown, else whether it
    /// finished within `timeout`.
    pub async fn wait(&self, id: &str, timeout: Duration) -> Option<bool> {
        let controller = self.controller(id)?;
        Some(controller.wait(timeout).await)
    }

    /// Snapshots of every known job, newest first.
    pub fn list(&self) -> Vec<Job> {
        let controllers: Vec<JobController> = self.jobs.lock().values().cloned().collect();
        controllers.iter().rev().map(JobController::snapshot).collect()
    }

    pub async fn resource_status(&self) -> Result<TokenStatus, TokenError> {
        self.tokens.status().await
    }

    /// Drop finished jobs older than the retention window. Returns how many.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.epoch_ms();
        let retention = u64::try_from(self.config.retention.as_millis()).unwrap_or(u64::MAX);
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, controller| {
            if !controller.is_done() {
                return true;
            }
            let job = controller.snapshot();
            let finished = job.finished_at_ms.unwrap_or(job.created_at_ms);
            now.saturating_sub(finished) < retention
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            tracing::info!(evicted, "evicted expired jobs");
        }
        evicted
    }

    /// Number of jobs whose scheduler is still running.
    pub fn active_count(&self) -> usize {
        self.jobs.lock().values().filter(|c| !c.is_done()).count()
    }

    /// Cancel every active job and wait up to `timeout` for each to settle.
    pub async fn shutdown(&self, timeout: Duration) {
        let active: Vec<JobController> =
            self.jobs.lock().values().filter(|c| !c.is_done()).cloned().collect();
        if active.is_empty() {
            return;
        }
        tracing::info!(jobs = active.len(), "cancelling active jobs for shutdown");
        let now = self.clock.epoch_ms();
        for controller in &active {
            controller.cancel(now);
        }
        for controller in &active {
            if !controller.wait(timeout).await {
                tracing::warn!(job_id = %controller.id(), "job did not settle before shutdown");
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
