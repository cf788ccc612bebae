// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Ingestion orchestration engine: token admission, retry policy,
//! dependency scheduling, and the job control surface.

mod config;
mod controller;
mod job_logger;
mod orchestrator;
mod retry;
mod scheduler;
mod tokens;

pub use config::{BackoffMode, EngineConfig, FailurePolicy};
pub use controller::{CancelOutcome, JobController};
pub use job_logger::{job_log_path, JobLogger};
pub use orchestrator::{Orchestrator, StartRequest};
pub use retry::{propagate_failure, RetryDecision, RetryPolicy, StepFailure};
pub use scheduler::{JobRunner, DEADLOCK_ERROR};
pub use tokens::{ResourceTokenManager, TokenError, TokenGrant, TokenStatus};
