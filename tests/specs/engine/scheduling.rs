// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling specs: termination on acyclic plans, rejection of cyclic ones.

use proptest::prelude::*;
use sluice_core::test_support::strategies::{arb_acyclic_plan, arb_cyclic_plan};
use sluice_core::ValidationError;

use crate::prelude::*;

fn names(plan: &[StepSpec]) -> Vec<&str> {
    plan.iter().map(|s| s.name.as_str()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn acyclic_plans_terminate_with_every_step_terminal(
        plan in arb_acyclic_plan(6),
        flaky in 0usize..4,
        max_retries in 0u32..3,
    ) {
        let plan: Vec<StepSpec> = plan.into_iter().map(|s| s.max_retries(max_retries)).collect();
        let adapter = FakeStepAdapter::succeeding().fail_times(flaky, "flaky");
        let job = paused_runtime().block_on(async {
            let orch = orchestrator(&names(&plan), &adapter, 2);
            run_to_end(&orch, StartRequest::new("/repos/demo", plan.clone())).await
        });

        prop_assert_ne!(job.status(), JobStatus::Running);
        prop_assert!(job.steps.values().all(|s| s.is_terminal()));
        // Nothing runs ahead of its dependencies
        for step in job.steps.values().filter(|s| s.status == StepStatus::Completed) {
            for dep in &step.dependencies {
                prop_assert_eq!(step_status(&job, dep), StepStatus::Completed);
            }
        }
    }

    #[test]
    fn cyclic_plans_are_rejected_at_registration(plan in arb_cyclic_plan(6)) {
        let adapter = FakeStepAdapter::succeeding();
        let (err, listed) = paused_runtime().block_on(async {
            let orch = orchestrator(&names(&plan), &adapter, 2);
            let err = orch.start(StartRequest::new("/repos/demo", plan.clone())).unwrap_err();
            (err, orch.list().len())
        });
        prop_assert!(matches!(err, ValidationError::DependencyCycle(_)), "{:?}", err);
        prop_assert_eq!(listed, 0);
        prop_assert_eq!(adapter.run_count(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn default_pipeline_runs_leaves_side_by_side() {
    let adapter = FakeStepAdapter::succeeding();
    let orch = orchestrator(&["filesystem", "structure", "summarize", "doc_link"], &adapter, 4);

    let job = run_to_end(&orch, StartRequest::new("/repos/demo", pipeline())).await;

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(adapter.run_count(), 4);
    // Both leaves wait on structure, then may run side by side
    assert_eq!(adapter.max_active(), 2);
}
