// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sluice-core: data model and state machine for the sluice ingestion engine

pub mod macros;

pub mod clock;
pub mod id;
pub mod job;
pub mod plan;
pub mod step;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use id::short;
pub use job::{Job, JobId, JobStatus, Params};
pub use plan::{validate_plan, ValidationError};
pub use step::{StepRecord, StepSpec, StepStatus, TransitionError};
