// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sluice daemon library: configuration, lifecycle, and the socket listener.
//!
//! The `sluiced` binary wires these together; the CLI only needs the wire
//! protocol and [`env::state_dir`].

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod pipeline;

pub use config::{ConfigError, DaemonConfig, StageConfig};
pub use lifecycle::{Config, DaemonState, LifecycleError, StartupResult};
pub use listener::{ListenCtx, Listener};
