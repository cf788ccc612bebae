// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sluice.toml`: engine tuning, counter store, and the stage pipeline.
//!
//! ```toml
//! [engine]
//! max_tokens = 4
//! acquire_timeout_ms = 30000
//! backoff = "linear"
//!
//! [counter_store]
//! kind = "file"
//!
//! [[stage]]
//! name = "filesystem"
//! command = "sluice-filesystem"
//! max_retries = 2
//! back_off_secs = 1
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sluice_adapters::{
    CommandStepAdapter, CounterStore, FileCounterStore, MemoryCounterStore, StepRegistry,
};
use sluice_core::StepSpec;
use sluice_engine::{BackoffMode, EngineConfig, FailurePolicy};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("invalid config {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("invalid pipeline: {0}")]
    Pipeline(#[from] sluice_core::ValidationError),
}

/// `[engine]`. Unset fields keep the engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub bucket: Option<String>,
    pub max_tokens: Option<u32>,
    pub acquire_timeout_ms: Option<u64>,
    pub acquire_retry_interval_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub counter_failure: Option<FailurePolicy>,
    pub backoff: Option<BackoffMode>,
    pub retention_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterStoreKind {
    /// Shared with other daemons on this host through lock-guarded files.
    #[default]
    File,
    /// Private to this daemon.
    Memory,
}

/// `[counter_store]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CounterStoreSection {
    pub kind: CounterStoreKind,
    /// Directory for counter files; defaults to `<state_dir>/counters`.
    pub path: Option<PathBuf>,
}

/// One `[[stage]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    pub name: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub back_off_secs: u64,
    #[serde(default = "default_uses_token")]
    pub uses_token: bool,
    /// Shell command; defaults to `sluice-<name>`.
    #[serde(default)]
    pub command: Option<String>,
}

fn default_uses_token() -> bool {
    true
}

impl StageConfig {
    fn new(name: &str, depends_on: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            max_retries: 2,
            back_off_secs: 1,
            uses_token: true,
            command: None,
        }
    }

    pub fn command(&self) -> String {
        self.command.clone().unwrap_or_else(|| format!("sluice-{}", self.name))
    }

    pub fn spec(&self) -> StepSpec {
        StepSpec::new(&self.name)
            .depends_on(self.depends_on.iter().cloned())
            .max_retries(self.max_retries)
            .back_off_secs(self.back_off_secs)
            .uses_token(self.uses_token)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub counter_store: CounterStoreSection,
    #[serde(default = "default_pipeline", rename = "stage")]
    pub stages: Vec<StageConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            engine: EngineSection::default(),
            counter_store: CounterStoreSection::default(),
            stages: default_pipeline(),
        }
    }
}

/// `filesystem → structure → {summarize, doc_link}`
pub fn default_pipeline() -> Vec<StageConfig> {
    vec![
        StageConfig::new("filesystem", &[]),
        StageConfig::new("structure", &["filesystem"]),
        StageConfig::new("summarize", &["structure"]),
        StageConfig::new("doc_link", &["structure"]),
    ]
}

impl DaemonConfig {
    /// Read `path`, or fall back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using default pipeline");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Read(path.to_path_buf(), e)),
        };
        let config = Self::parse(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// The configured pipeline must itself be a valid plan.
    pub fn validate(&self) -> Result<(), ConfigError> {
        sluice_core::validate_plan(&self.plan())?;
        Ok(())
    }

    pub fn plan(&self) -> Vec<StepSpec> {
        self.stages.iter().map(StageConfig::spec).collect()
    }

    /// Engine settings: file values over defaults, env overrides on top.
    pub fn engine_config(&self, log_dir: &Path) -> EngineConfig {
        let e = &self.engine;
        let mut config = EngineConfig::default().log_dir(log_dir);
        if let Some(bucket) = &e.bucket {
            config = config.bucket(bucket.as_str());
        }
        if let Some(max) = crate::env::max_tokens().or(e.max_tokens) {
            config = config.max_tokens(max);
        }
        if let Some(timeout) =
            crate::env::acquire_timeout().or(e.acquire_timeout_ms.map(Duration::from_millis))
        {
            config = config.acquire_timeout(timeout);
        }
        if let Some(ms) = e.acquire_retry_interval_ms {
            config = config.acquire_retry_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = e.poll_interval_ms {
            config = config.poll_interval(Duration::from_millis(ms));
        }
        if let Some(policy) = e.counter_failure {
            config = config.counter_failure(policy);
        }
        if let Some(mode) = e.backoff {
            config = config.backoff(mode);
        }
        if let Some(secs) = e.retention_secs {
            config = config.retention(Duration::from_secs(secs));
        }
        config
    }

    /// One `CommandStepAdapter` per stage.
    pub fn registry(&self) -> StepRegistry {
        let mut registry = StepRegistry::new();
        for stage in &self.stages {
            registry.register(stage.name.as_str(), CommandStepAdapter::new(&stage.name, stage.command()));
        }
        registry
    }

    pub fn counter_store(&self, state_dir: &Path) -> Arc<dyn CounterStore> {
        match self.counter_store.kind {
            CounterStoreKind::Memory => Arc::new(MemoryCounterStore::new()),
            CounterStoreKind::File => {
                let dir =
                    self.counter_store.path.clone().unwrap_or_else(|| state_dir.join("counters"));
                Arc::new(FileCounterStore::new(dir))
            }
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
