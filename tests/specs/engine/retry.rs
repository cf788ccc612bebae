// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry specs: attempt budget and fixed back-off.

use tokio::time::Instant;

use crate::prelude::*;

#[tokio::test(start_paused = true)]
async fn always_failing_step_uses_its_whole_budget() {
    for max_retries in 0..=3 {
        let adapter = FakeStepAdapter::failing("disk full");
        let orch = orchestrator(&["filesystem"], &adapter, 2);
        let plan = vec![StepSpec::new("filesystem").max_retries(max_retries)];

        let job = run_to_end(&orch, StartRequest::new("/repos/demo", plan)).await;

        let step = job.step("filesystem").unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.retry_count, max_retries + 1, "max_retries = {max_retries}");
        assert_eq!(adapter.run_count(), max_retries as usize + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn filesystem_recovers_after_two_failures() {
    let adapter = FakeStepAdapter::succeeding().fail_times(2, "connection reset");
    let orch = orchestrator(&["filesystem"], &adapter, 2);
    let plan = vec![StepSpec::new("filesystem").max_retries(2).back_off_secs(1)];

    let started = Instant::now();
    let job = run_to_end(&orch, StartRequest::new("/repos/demo", plan)).await;

    let step = job.step("filesystem").unwrap();
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.retry_count, 2);
    assert_eq!(step.last_error, None);
    assert_eq!(adapter.run_count(), 3);
    // One second of back-off before each retry
    assert!(started.elapsed() >= Duration::from_secs(2), "{:?}", started.elapsed());
}

#[tokio::test(start_paused = true)]
async fn filesystem_always_failing_keeps_last_error() {
    let adapter = FakeStepAdapter::failing("permission denied")
        .then(FakeOutcome::Fail("timeout reading tree".into()))
        .then(FakeOutcome::Fail("connection reset".into()));
    let orch = orchestrator(&["filesystem"], &adapter, 2);
    let plan = vec![StepSpec::new("filesystem").max_retries(2).back_off_secs(1)];

    let job = run_to_end(&orch, StartRequest::new("/repos/demo", plan)).await;

    let step = job.step("filesystem").unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.retry_count, 3);
    assert_eq!(step.last_error.as_deref(), Some("permission denied"));
}

#[tokio::test(start_paused = true)]
async fn terminal_failure_is_not_retried() {
    let adapter = FakeStepAdapter::succeeding()
        .then(FakeOutcome::FailTerminal("repository not found".into()));
    let orch = orchestrator(&["filesystem"], &adapter, 2);
    let plan = vec![StepSpec::new("filesystem").max_retries(5)];

    let job = run_to_end(&orch, StartRequest::new("/repos/demo", plan)).await;

    let step = job.step("filesystem").unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.last_error.as_deref(), Some("repository not found"));
    assert_eq!(adapter.run_count(), 1);
}
