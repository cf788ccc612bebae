// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Name → adapter lookup consulted when a job is started.

use crate::step::StepAdapter;
use std::collections::HashMap;
use std::sync::Arc;

/// Step adapters known to the engine, keyed by step name.
#[derive(Clone, Default)]
pub struct StepRegistry {
    adapters: HashMap<String, Arc<dyn StepAdapter>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with(mut self, name: impl Into<String>, adapter: impl StepAdapter) -> Self {
        self.register(name, adapter);
        self
    }

    /// Register or replace the adapter for `name`.
    pub fn register(&mut self, name: impl Into<String>, adapter: impl StepAdapter) {
        self.adapters.insert(name.into(), Arc::new(adapter));
    }

    /// Register an adapter that is already shared.
    pub fn insert(&mut self, name: impl Into<String>, adapter: Arc<dyn StepAdapter>) {
        self.adapters.insert(name.into(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StepAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry").field("steps", &self.names()).finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
