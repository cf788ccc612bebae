// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure propagation specs.

use crate::prelude::*;

#[tokio::test(start_paused = true)]
async fn dependents_of_a_failed_step_fail_without_running() {
    let filesystem = FakeStepAdapter::failing("clone failed");
    let rest = FakeStepAdapter::succeeding();
    let registry = registry(&[
        ("filesystem", &filesystem),
        ("structure", &rest),
        ("summarize", &rest),
        ("doc_link", &rest),
    ]);
    let orch = Orchestrator::new(config(4), registry, Arc::new(MemoryCounterStore::new()));
    let plan = vec![
        StepSpec::new("filesystem").max_retries(1),
        StepSpec::new("structure").depends_on(["filesystem"]),
        StepSpec::new("summarize").depends_on(["structure"]),
        StepSpec::new("doc_link").depends_on(["structure"]),
    ];

    let job = run_to_end(&orch, StartRequest::new("/repos/demo", plan)).await;

    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.step("filesystem").unwrap().retry_count, 2);
    for name in ["structure", "summarize", "doc_link"] {
        let step = job.step(name).unwrap();
        assert_eq!(step.status, StepStatus::Failed, "{name}");
        assert!(step.last_error.as_deref().unwrap().contains("filesystem"), "{name}: {:?}", step.last_error);
        assert_eq!(step.retry_count, 0, "{name}");
        assert_eq!(step.started_at_ms, None, "{name}");
    }
    assert_eq!(rest.run_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn independent_branches_still_complete() {
    let structure = FakeStepAdapter::failing("parse error");
    let rest = FakeStepAdapter::succeeding();
    let registry = registry(&[
        ("filesystem", &rest),
        ("structure", &structure),
        ("summarize", &rest),
        ("doc_link", &rest),
    ]);
    let orch = Orchestrator::new(config(4), registry, Arc::new(MemoryCounterStore::new()));
    let plan = vec![
        StepSpec::new("filesystem"),
        StepSpec::new("structure").depends_on(["filesystem"]),
        StepSpec::new("summarize").depends_on(["structure"]),
        StepSpec::new("doc_link").depends_on(["filesystem"]),
    ];

    let job = run_to_end(&orch, StartRequest::new("/repos/demo", plan)).await;

    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(step_status(&job, "filesystem"), StepStatus::Completed);
    assert_eq!(step_status(&job, "doc_link"), StepStatus::Completed);
    assert_eq!(step_status(&job, "summarize"), StepStatus::Failed);
    assert_eq!(rest.run_count(), 2);
}
