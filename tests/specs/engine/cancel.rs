// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation specs.

use std::collections::HashMap;

use crate::prelude::*;

fn statuses(job: &Job) -> HashMap<String, StepStatus> {
    job.steps.iter().map(|(name, step)| (name.clone(), step.status)).collect()
}

async fn cancelled_snapshot(times: usize) -> (Job, Vec<CancelOutcome>) {
    let adapter = FakeStepAdapter::hanging();
    let orch = orchestrator(&["filesystem", "structure", "summarize"], &adapter, 2);
    let id = orch
        .start(StartRequest::new("/repos/demo", linear_specs(&["filesystem", "structure", "summarize"])))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let outcomes = (0..times).map(|_| orch.cancel(id.as_str())).collect();
    assert_eq!(orch.wait(id.as_str(), Duration::from_secs(60)).await, Some(true));
    (orch.status(id.as_str()).unwrap(), outcomes)
}

#[tokio::test(start_paused = true)]
async fn cancelling_twice_matches_cancelling_once() {
    let (once, once_outcomes) = cancelled_snapshot(1).await;
    let (twice, twice_outcomes) = cancelled_snapshot(2).await;

    assert_eq!(once_outcomes, [CancelOutcome::Cancelled]);
    assert_eq!(twice_outcomes, [CancelOutcome::Cancelled, CancelOutcome::Cancelled]);
    assert_eq!(once.status(), JobStatus::Cancelled);
    assert_eq!(statuses(&once), statuses(&twice));
}

#[tokio::test(start_paused = true)]
async fn cancel_after_completion_changes_nothing() {
    let adapter = FakeStepAdapter::succeeding();
    let orch = orchestrator(&["filesystem"], &adapter, 2);
    let job = run_to_end(&orch, StartRequest::new("/repos/demo", linear_specs(&["filesystem"]))).await;
    let id = job.id.as_str();

    assert_eq!(orch.cancel(id), CancelOutcome::AlreadyTerminal);
    assert_eq!(orch.cancel(id), CancelOutcome::AlreadyTerminal);
    let after = orch.status(id).unwrap();
    assert_eq!(after.status(), JobStatus::Completed);
    assert!(!after.cancel_requested);
    assert_eq!(statuses(&after), statuses(&job));
}

#[tokio::test(start_paused = true)]
async fn cancel_while_pending_cancels_dependents_unstarted() {
    // One token, held by another job's hanging step, keeps A pending
    let blocker = FakeStepAdapter::hanging();
    let a = FakeStepAdapter::succeeding();
    let b = FakeStepAdapter::succeeding();
    let registry = registry(&[("blocker", &blocker), ("a", &a), ("b", &b)]);
    let orch = Orchestrator::new(config(1), registry, Arc::new(MemoryCounterStore::new()));

    let blocking = orch.start(StartRequest::new("/repos/other", linear_specs(&["blocker"]))).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let id = orch
        .start(StartRequest::new(
            "/repos/demo",
            vec![StepSpec::new("a"), StepSpec::new("b").depends_on(["a"])],
        ))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(step_status(&orch.status(id.as_str()).unwrap(), "a"), StepStatus::Pending);

    assert_eq!(orch.cancel(id.as_str()), CancelOutcome::Cancelled);
    assert_eq!(orch.wait(id.as_str(), Duration::from_secs(60)).await, Some(true));

    let job = orch.status(id.as_str()).unwrap();
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert_eq!(step_status(&job, "a"), StepStatus::Cancelled);
    assert_eq!(step_status(&job, "b"), StepStatus::Cancelled);
    assert_eq!(job.step("b").unwrap().started_at_ms, None);
    assert_eq!((a.run_count(), b.run_count()), (0, 0));

    orch.cancel(blocking.as_str());
    assert_eq!(orch.wait(blocking.as_str(), Duration::from_secs(60)).await, Some(true));
    let tokens = orch.resource_status().await.unwrap();
    assert_eq!((tokens.available, tokens.held), (1, 0));
}
