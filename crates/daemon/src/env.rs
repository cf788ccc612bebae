// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

fn duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Resolve state directory: SLUICE_STATE_DIR > XDG_STATE_HOME/sluice > ~/.local/state/sluice
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("SLUICE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("sluice"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/sluice"))
}

/// Per-message IPC timeout
pub fn ipc_timeout() -> Duration {
    duration_ms("SLUICE_IPC_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// How long shutdown waits for cancelled jobs to settle (default 10s).
pub fn drain_timeout() -> Duration {
    duration_ms("SLUICE_DRAIN_TIMEOUT_MS").unwrap_or(Duration::from_secs(10))
}

/// How often finished jobs past their retention are evicted (default 60s).
pub fn reap_interval() -> Duration {
    duration_ms("SLUICE_REAP_INTERVAL_MS").unwrap_or(Duration::from_secs(60))
}

/// Override for `[engine] max_tokens`.
pub fn max_tokens() -> Option<u32> {
    std::env::var("SLUICE_MAX_TOKENS").ok().and_then(|s| s.parse::<u32>().ok())
}

/// Override for `[engine] acquire_timeout_ms`.
pub fn acquire_timeout() -> Option<Duration> {
    duration_ms("SLUICE_ACQUIRE_TIMEOUT_MS")
}

/// Log filter directive: SLUICE_LOG > RUST_LOG > "info"
pub fn log_filter() -> String {
    std::env::var("SLUICE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
