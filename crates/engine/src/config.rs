// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration, passed explicitly to every component.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default token bucket shared by all ingestion jobs.
pub const DEFAULT_BUCKET: &str = "ingest_resource_tokens";

/// What `acquire` does when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Treat the outage as a resource timeout.
    #[default]
    FailClosed,
    /// Grant an uncounted token and keep going.
    FailOpen,
}

/// How the retry delay grows with each attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffMode {
    /// Always `back_off_secs`.
    #[default]
    Fixed,
    /// `back_off_secs * retry_count`.
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub bucket: String,
    pub max_tokens: u32,
    pub acquire_timeout: Duration,
    pub acquire_retry_interval: Duration,
    pub poll_interval: Duration,
    pub counter_failure: FailurePolicy,
    pub backoff: BackoffMode,
    /// How long terminal jobs stay queryable.
    pub retention: Duration,
    /// Root for per-job activity logs; `None` disables them.
    pub log_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            max_tokens: 4,
            acquire_timeout: Duration::from_secs(30),
            acquire_retry_interval: Duration::from_millis(500),
            poll_interval: Duration::from_millis(200),
            counter_failure: FailurePolicy::FailClosed,
            backoff: BackoffMode::Fixed,
            retention: Duration::from_secs(60 * 60),
            log_dir: None,
        }
    }
}

impl EngineConfig {
    sluice_core::setters! {
        into {
            bucket: String,
        }
        set {
            max_tokens: u32,
            acquire_timeout: Duration,
            acquire_retry_interval: Duration,
            poll_interval: Duration,
            counter_failure: FailurePolicy,
            backoff: BackoffMode,
            retention: Duration,
        }
        option {
            log_dir: PathBuf,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
