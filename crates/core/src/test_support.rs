// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{Job, JobId, Params, StepSpec};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for the step/plan model.
pub mod strategies {
    use crate::step::{StepSpec, StepStatus};
    use proptest::prelude::*;

    pub fn arb_step_status() -> impl Strategy<Value = StepStatus> {
        prop_oneof![
            Just(StepStatus::Pending),
            Just(StepStatus::Running),
            Just(StepStatus::Completed),
            Just(StepStatus::Failed),
            Just(StepStatus::Cancelled),
            Just(StepStatus::Stopped),
        ]
    }

    /// Random DAG of 1..=max steps: each step may only depend on steps
    /// registered before it, so the plan is acyclic by construction.
    pub fn arb_acyclic_plan(max: usize) -> impl Strategy<Value = Vec<StepSpec>> {
        (1..=max)
            .prop_flat_map(|n| proptest::collection::vec(any::<u64>(), n))
            .prop_map(|masks| {
                masks
                    .iter()
                    .enumerate()
                    .map(|(i, mask)| {
                        let deps: Vec<String> =
                            (0..i).filter(|j| mask & (1 << j) != 0).map(|j| format!("s{}", j)).collect();
                        StepSpec::new(format!("s{}", i)).depends_on(deps)
                    })
                    .collect()
            })
    }

    /// An acyclic plan with one back edge added from the first step to the
    /// last, closing a cycle through every step on that path.
    pub fn arb_cyclic_plan(max: usize) -> impl Strategy<Value = Vec<StepSpec>> {
        (2..=max.max(2)).prop_map(|n| {
            (0..n)
                .map(|i| {
                    let dep = if i == 0 { n - 1 } else { i - 1 };
                    StepSpec::new(format!("s{}", i)).depends_on([format!("s{}", dep)])
                })
                .collect()
        })
    }
}

// ── Builders ────────────────────────────────────────────────────────────────

/// Specs forming a chain: each step depends on the previous one.
pub fn linear_specs(names: &[&str]) -> Vec<StepSpec> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let spec = StepSpec::new(*name);
            if i == 0 {
                spec
            } else {
                spec.depends_on([names[i - 1]])
            }
        })
        .collect()
}

/// A job over `/test/repo` with no parameters, created at epoch 1_000_000.
pub fn job_with(specs: &[StepSpec]) -> Job {
    Job::new(JobId::from_string("job-test"), "/test/repo", Params::new(), specs, 1_000_000)
}
