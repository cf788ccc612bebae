// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registration-time validation of a job's step plan.

use crate::step::StepSpec;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Reasons a job is rejected before it reaches the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("job has no steps")]
    EmptyPlan,

    #[error("repository path is empty")]
    EmptyRepositoryPath,

    #[error("step '{0}' registered more than once")]
    DuplicateStep(String),

    #[error("unknown step '{0}'")]
    UnknownStep(String),

    #[error("step '{step}' depends on '{dependency}', which is not part of this job")]
    UnknownDependency { step: String, dependency: String },

    #[error("step '{0}' depends on itself")]
    SelfDependency(String),

    #[error("dependency cycle among steps: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("job {0} is already active")]
    JobAlreadyActive(String),

    #[error("invalid job id '{0}': use letters, digits, '-' or '_'")]
    InvalidJobId(String),
}

/// Validate a plan and return its step names in a dependency-respecting order.
///
/// A dependency may name any step of the same plan, earlier or later; only
/// cycles are rejected. Ties keep registration order, so the result is
/// deterministic.
pub fn validate_plan(specs: &[StepSpec]) -> Result<Vec<String>, ValidationError> {
    if specs.is_empty() {
        return Err(ValidationError::EmptyPlan);
    }

    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(ValidationError::DuplicateStep(spec.name.clone()));
        }
    }

    for spec in specs {
        for dep in &spec.depends_on {
            if dep == &spec.name {
                return Err(ValidationError::SelfDependency(spec.name.clone()));
            }
            if !seen.contains(dep.as_str()) {
                return Err(ValidationError::UnknownDependency {
                    step: spec.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    // Kahn's algorithm; whatever never reaches in-degree zero sits on or
    // behind a cycle.
    let mut in_degree: HashMap<&str, usize> = specs
        .iter()
        .map(|s| {
            let unique: HashSet<&str> = s.depends_on.iter().map(String::as_str).collect();
            (s.name.as_str(), unique.len())
        })
        .collect();
    let mut ready: VecDeque<&str> =
        specs.iter().filter(|s| in_degree[s.name.as_str()] == 0).map(|s| s.name.as_str()).collect();
    let mut order = Vec::with_capacity(specs.len());

    while let Some(name) = ready.pop_front() {
        order.push(name.to_string());
        for spec in specs {
            let depends = spec.depends_on.iter().any(|d| d == name);
            if !depends {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(spec.name.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(spec.name.as_str());
                }
            }
        }
    }

    if order.len() < specs.len() {
        let stuck = specs
            .iter()
            .filter(|s| !order.contains(&s.name))
            .map(|s| s.name.clone())
            .collect();
        return Err(ValidationError::DependencyCycle(stuck));
    }

    Ok(order)
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
