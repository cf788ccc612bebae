// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters at the edges of the sluice engine: step runtimes and counter stores.

pub mod command;
pub mod counter;
pub mod registry;
pub mod step;

pub use command::CommandStepAdapter;
pub use counter::{CounterStore, CounterStoreError, FileCounterStore, MemoryCounterStore};
pub use registry::StepRegistry;
pub use step::{StepAdapter, StepAdapterError, StepHandle, StepReport, StepState};

#[cfg(any(test, feature = "test-support"))]
pub use counter::FakeCounterStore;
#[cfg(any(test, feature = "test-support"))]
pub use step::{FakeOutcome, FakeStepAdapter, RunCall};
