// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turn a client's step selection into a plan over the configured stages.

use std::collections::HashSet;

use sluice_core::{StepSpec, ValidationError};
use sluice_wire::StepSelection;

use crate::config::StageConfig;

/// Resolve `selection` against the configured `stages`.
///
/// Named stages pull in their transitive dependencies; the result keeps the
/// configured order. An explicit plan passes through untouched and is
/// validated by the orchestrator.
pub fn resolve(
    selection: StepSelection,
    stages: &[StageConfig],
) -> Result<Vec<StepSpec>, ValidationError> {
    let names = match selection {
        StepSelection::Plan(plan) => return Ok(plan),
        StepSelection::Names(names) if names.is_empty() => {
            return Ok(stages.iter().map(StageConfig::spec).collect())
        }
        StepSelection::Names(names) => names,
    };

    let mut wanted: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();
    for name in &names {
        if !stages.iter().any(|s| &s.name == name) {
            return Err(ValidationError::UnknownStep(name.clone()));
        }
        stack.push(name);
    }
    while let Some(name) = stack.pop() {
        if !wanted.insert(name) {
            continue;
        }
        if let Some(stage) = stages.iter().find(|s| s.name == name) {
            stack.extend(stage.depends_on.iter().map(String::as_str));
        }
    }

    Ok(stages.iter().filter(|s| wanted.contains(s.name.as_str())).map(StageConfig::spec).collect())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
