// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the engine specs.

pub use std::sync::Arc;
pub use std::time::Duration;

pub use sluice_adapters::{FakeOutcome, FakeStepAdapter, MemoryCounterStore, StepRegistry};
pub use sluice_core::test_support::linear_specs;
pub use sluice_core::{Job, JobStatus, StepSpec, StepStatus};
pub use sluice_engine::{CancelOutcome, EngineConfig, Orchestrator, StartRequest};

/// The default four-stage pipeline: filesystem → structure → {summarize, doc_link}.
pub fn pipeline() -> Vec<StepSpec> {
    vec![
        StepSpec::new("filesystem"),
        StepSpec::new("structure").depends_on(["filesystem"]),
        StepSpec::new("summarize").depends_on(["structure"]),
        StepSpec::new("doc_link").depends_on(["structure"]),
    ]
}

pub fn config(max_tokens: u32) -> EngineConfig {
    EngineConfig::default()
        .max_tokens(max_tokens)
        .poll_interval(Duration::from_millis(10))
        .acquire_timeout(Duration::from_secs(120))
        .acquire_retry_interval(Duration::from_millis(50))
}

/// Registry mapping each name to its adapter.
pub fn registry(entries: &[(&str, &FakeStepAdapter)]) -> StepRegistry {
    let mut registry = StepRegistry::new();
    for (name, adapter) in entries {
        registry.register(*name, (*adapter).clone());
    }
    registry
}

/// Orchestrator where every step name shares one adapter.
pub fn orchestrator(names: &[&str], adapter: &FakeStepAdapter, max_tokens: u32) -> Orchestrator {
    let entries: Vec<(&str, &FakeStepAdapter)> = names.iter().map(|n| (*n, adapter)).collect();
    Orchestrator::new(config(max_tokens), registry(&entries), Arc::new(MemoryCounterStore::new()))
}

/// Start a job and wait for it to finish, returning its final snapshot.
pub async fn run_to_end(orch: &Orchestrator, request: StartRequest) -> Job {
    let id = orch.start(request).unwrap();
    assert_eq!(orch.wait(id.as_str(), Duration::from_secs(3600)).await, Some(true));
    orch.status(id.as_str()).unwrap()
}

/// Current-thread runtime with paused time, for property tests.
pub fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().start_paused(true).build().unwrap()
}

pub fn step_status(job: &Job, name: &str) -> StepStatus {
    job.step(name).unwrap().status
}
