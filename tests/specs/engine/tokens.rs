// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token bucket specs: conservation and the concurrency bound.

use proptest::prelude::*;

use crate::prelude::*;

const FOUR: [&str; 4] = ["filesystem", "structure", "summarize", "doc_link"];

fn independent(names: &[&str]) -> Vec<StepSpec> {
    names.iter().map(|n| StepSpec::new(*n)).collect()
}

#[tokio::test(start_paused = true)]
async fn two_tokens_bound_four_steps_to_two_at_a_time() {
    let adapter = FakeStepAdapter::succeeding().with_duration(Duration::from_secs(1));
    let orch = orchestrator(&FOUR, &adapter, 2);

    let job = run_to_end(&orch, StartRequest::new("/repos/demo", independent(&FOUR))).await;

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(adapter.run_count(), 4);
    assert_eq!(adapter.max_active(), 2);
}

#[tokio::test(start_paused = true)]
async fn tokenless_steps_do_not_count_against_the_bucket() {
    let adapter = FakeStepAdapter::succeeding().with_duration(Duration::from_secs(1));
    let orch = orchestrator(&FOUR, &adapter, 1);
    let plan = FOUR.iter().map(|n| StepSpec::new(*n).uses_token(false)).collect();

    let job = run_to_end(&orch, StartRequest::new("/repos/demo", plan)).await;

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(adapter.max_active(), 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// `available + held == max` at every observation, across concurrent jobs.
    #[test]
    fn tokens_are_conserved(
        max_tokens in 1u32..4,
        jobs in 1usize..4,
        steps in 1usize..5,
        flaky in 0usize..3,
    ) {
        let names = &FOUR[..steps];
        let adapter = FakeStepAdapter::succeeding()
            .fail_times(flaky, "flaky")
            .with_duration(Duration::from_millis(30));
        let violations = paused_runtime().block_on(async {
            let orch = orchestrator(names, &adapter, max_tokens);
            orch.initialize().await.unwrap();
            let plan: Vec<StepSpec> = independent(names).into_iter().map(|s| s.max_retries(3)).collect();
            let ids: Vec<_> = (0..jobs)
                .map(|_| orch.start(StartRequest::new("/repos/demo", plan.clone())).unwrap())
                .collect();

            let mut violations = Vec::new();
            while orch.active_count() > 0 {
                let status = orch.resource_status().await.unwrap();
                if status.available + status.held != status.max || status.held > status.max {
                    violations.push(status);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            for id in &ids {
                assert_eq!(orch.wait(id.as_str(), Duration::ZERO).await, Some(true));
            }
            let end = orch.resource_status().await.unwrap();
            if (end.available, end.held) != (max_tokens, 0) {
                violations.push(end);
            }
            violations
        });

        prop_assert!(violations.is_empty(), "{:?}", violations);
        prop_assert!(adapter.max_active() <= max_tokens as usize);
    }
}
