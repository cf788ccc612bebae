// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step runtime adapter: the narrow interface every ingestion stage implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sluice_core::Params;
use std::path::Path;
use thiserror::Error;

/// Opaque handle to one attempt of a step, issued by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepHandle(pub String);

impl std::fmt::Display for StepHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution state as seen by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Running,
    Completed,
    Failed,
}

/// Result of polling an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub state: StepState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// False when the stage knows another attempt cannot succeed.
    #[serde(default = "default_retryable")]
    pub retryable: bool,
}

fn default_retryable() -> bool {
    true
}

impl StepReport {
    pub fn running(progress: Option<f32>) -> Self {
        Self { state: StepState::Running, progress, error: None, result: None, retryable: true }
    }

    pub fn completed(result: Option<serde_json::Value>) -> Self {
        Self { state: StepState::Completed, progress: Some(1.0), error: None, result, retryable: true }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: StepState::Failed,
            progress: None,
            error: Some(error.into()),
            result: None,
            retryable: true,
        }
    }

    /// A failure the retry policy must not retry.
    pub fn failed_terminal(error: impl Into<String>) -> Self {
        Self { retryable: false, ..Self::failed(error) }
    }
}

/// Errors talking to a step backend.
#[derive(Debug, Error)]
pub enum StepAdapterError {
    #[error("failed to launch step: {0}")]
    Launch(String),

    #[error("unknown step handle: {0}")]
    UnknownHandle(StepHandle),

    #[error("step backend error: {0}")]
    Backend(String),
}

/// Runtime interface for an ingestion stage.
///
/// `run` must be safe to call again for the same logical step: the scheduler
/// calls it once per attempt.
#[async_trait]
pub trait StepAdapter: Send + Sync + 'static {
    /// Launch one attempt against `repository_path`.
    async fn run(
        &self,
        repository_path: &Path,
        params: &Params,
    ) -> Result<StepHandle, StepAdapterError>;

    /// Poll an attempt.
    async fn status(&self, handle: &StepHandle) -> Result<StepReport, StepAdapterError>;

    /// Cooperative stop. Returns `false` when the stage has no stop hook.
    async fn stop(&self, handle: &StepHandle) -> Result<bool, StepAdapterError> {
        let _ = handle;
        Ok(false)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{StepAdapter, StepAdapterError, StepHandle, StepReport};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sluice_core::Params;
    use std::collections::{HashMap, VecDeque};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    /// How a single fake attempt ends.
    #[derive(Debug, Clone, PartialEq)]
    pub enum FakeOutcome {
        Succeed(Option<serde_json::Value>),
        Fail(String),
        FailTerminal(String),
        /// Never finishes on its own; only a stop ends it.
        Hang,
    }

    /// Recorded `run` call.
    #[derive(Debug, Clone)]
    pub struct RunCall {
        pub handle: StepHandle,
        pub repository_path: PathBuf,
        pub params: Params,
    }

    struct Attempt {
        outcome: FakeOutcome,
        finishes_at: Instant,
        stopped: bool,
        done: bool,
    }

    struct FakeStepState {
        script: VecDeque<FakeOutcome>,
        fallback: FakeOutcome,
        duration: Duration,
        supports_stop: bool,
        calls: Vec<RunCall>,
        attempts: HashMap<StepHandle, Attempt>,
        active: usize,
        max_active: usize,
        next: u64,
    }

    /// Scripted step adapter for tests.
    ///
    /// Each `run` consumes the next scripted outcome (falling back to the
    /// default once the script is empty). Attempts stay running for the
    /// configured duration, measured on tokio's clock so paused-time tests
    /// advance instantly. Clones share state, so one fake registered under
    /// several step names reports their combined concurrency.
    #[derive(Clone)]
    pub struct FakeStepAdapter {
        inner: Arc<Mutex<FakeStepState>>,
    }

    impl FakeStepAdapter {
        fn with_fallback(fallback: FakeOutcome) -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeStepState {
                    script: VecDeque::new(),
                    fallback,
                    duration: Duration::from_millis(10),
                    supports_stop: true,
                    calls: Vec::new(),
                    attempts: HashMap::new(),
                    active: 0,
                    max_active: 0,
                    next: 0,
                })),
            }
        }

        /// Every attempt succeeds.
        pub fn succeeding() -> Self {
            Self::with_fallback(FakeOutcome::Succeed(None))
        }

        /// Every attempt fails with `error`.
        pub fn failing(error: impl Into<String>) -> Self {
            Self::with_fallback(FakeOutcome::Fail(error.into()))
        }

        /// Every attempt runs until stopped.
        pub fn hanging() -> Self {
            Self::with_fallback(FakeOutcome::Hang)
        }

        /// Queue `n` failing attempts ahead of the default outcome.
        pub fn fail_times(self, n: usize, error: impl Into<String>) -> Self {
            let error = error.into();
            {
                let mut inner = self.inner.lock();
                for _ in 0..n {
                    inner.script.push_back(FakeOutcome::Fail(error.clone()));
                }
            }
            self
        }

        /// Queue a single scripted outcome.
        pub fn then(self, outcome: FakeOutcome) -> Self {
            self.inner.lock().script.push_back(outcome);
            self
        }

        /// How long each attempt reports `running` before finishing.
        pub fn with_duration(self, duration: Duration) -> Self {
            self.inner.lock().duration = duration;
            self
        }

        /// Drop the stop hook, so `stop` reports unsupported.
        pub fn without_stop(self) -> Self {
            self.inner.lock().supports_stop = false;
            self
        }

        pub fn calls(&self) -> Vec<RunCall> {
            self.inner.lock().calls.clone()
        }

        pub fn run_count(&self) -> usize {
            self.inner.lock().calls.len()
        }

        /// Attempts launched but not yet observed finished.
        pub fn active(&self) -> usize {
            self.inner.lock().active
        }

        /// Highest number of simultaneously active attempts seen.
        pub fn max_active(&self) -> usize {
            self.inner.lock().max_active
        }
    }

    #[async_trait]
    impl StepAdapter for FakeStepAdapter {
        async fn run(
            &self,
            repository_path: &Path,
            params: &Params,
        ) -> Result<StepHandle, StepAdapterError> {
            let mut inner = self.inner.lock();
            inner.next += 1;
            let handle = StepHandle(format!("fake-{}", inner.next));
            let outcome = inner.script.pop_front().unwrap_or_else(|| inner.fallback.clone());
            let finishes_at = Instant::now() + inner.duration;
            inner.attempts.insert(
                handle.clone(),
                Attempt { outcome, finishes_at, stopped: false, done: false },
            );
            inner.calls.push(RunCall {
                handle: handle.clone(),
                repository_path: repository_path.to_path_buf(),
                params: params.clone(),
            });
            inner.active += 1;
            inner.max_active = inner.max_active.max(inner.active);
            Ok(handle)
        }

        async fn status(&self, handle: &StepHandle) -> Result<StepReport, StepAdapterError> {
            let mut inner = self.inner.lock();
            let state = &mut *inner;
            let attempt = state
                .attempts
                .get_mut(handle)
                .ok_or_else(|| StepAdapterError::UnknownHandle(handle.clone()))?;

            if attempt.stopped {
                return Ok(StepReport::failed("stopped"));
            }
            let finished =
                attempt.outcome != FakeOutcome::Hang && Instant::now() >= attempt.finishes_at;
            if !finished {
                return Ok(StepReport::running(Some(0.5)));
            }
            if !attempt.done {
                attempt.done = true;
                state.active -= 1;
            }
            Ok(match &attempt.outcome {
                FakeOutcome::Succeed(result) => StepReport::completed(result.clone()),
                FakeOutcome::Fail(error) => StepReport::failed(error.clone()),
                FakeOutcome::FailTerminal(error) => StepReport::failed_terminal(error.clone()),
                FakeOutcome::Hang => StepReport::running(None),
            })
        }

        async fn stop(&self, handle: &StepHandle) -> Result<bool, StepAdapterError> {
            let mut inner = self.inner.lock();
            if !inner.supports_stop {
                return Ok(false);
            }
            let state = &mut *inner;
            let attempt = state
                .attempts
                .get_mut(handle)
                .ok_or_else(|| StepAdapterError::UnknownHandle(handle.clone()))?;
            attempt.stopped = true;
            if !attempt.done {
                attempt.done = true;
                state.active -= 1;
            }
            Ok(true)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeOutcome, FakeStepAdapter, RunCall};

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
