// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step adapter that runs a shell command per attempt.

use crate::step::{StepAdapter, StepAdapterError, StepHandle, StepReport};
use async_trait::async_trait;
use parking_lot::Mutex;
use sluice_core::Params;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Lines of output kept per stream.
const TAIL_LINES: usize = 40;

/// `bash` exit code for "command not found"; retrying cannot help.
const EXIT_NOT_FOUND: i32 = 127;

/// How long output may keep draining after `bash` exits. A backgrounded
/// grandchild can hold the pipes open indefinitely.
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

type Tail = Arc<Mutex<VecDeque<String>>>;

struct Running {
    child: Child,
    stdout: Tail,
    stderr: Tail,
    readers: Vec<JoinHandle<()>>,
    exited_at: Option<Instant>,
}

/// Runs `bash -c <command>` in the repository directory.
///
/// The child sees `SLUICE_REPO`, `SLUICE_STEP`, and one
/// `SLUICE_PARAM_<KEY>` variable per job parameter. A zero exit completes
/// the step with `{"exit_code": 0, "output": <stdout tail>}`.
#[derive(Clone)]
pub struct CommandStepAdapter {
    step: String,
    command: String,
    next: Arc<AtomicU64>,
    children: Arc<Mutex<HashMap<StepHandle, Running>>>,
}

impl CommandStepAdapter {
    pub fn new(step: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            command: command.into(),
            next: Arc::new(AtomicU64::new(0)),
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

/// `depth` → `SLUICE_PARAM_DEPTH`; anything outside `[A-Za-z0-9_]` becomes `_`.
pub fn param_env_name(key: &str) -> String {
    let key: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("SLUICE_PARAM_{}", key)
}

fn spawn_tail<R>(reader: R, tail: Tail) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut tail = tail.lock();
            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    })
}

fn joined(tail: &Tail) -> String {
    tail.lock().iter().cloned().collect::<Vec<_>>().join("\n")
}

#[async_trait]
impl StepAdapter for CommandStepAdapter {
    async fn run(
        &self,
        repository_path: &Path,
        params: &Params,
    ) -> Result<StepHandle, StepAdapterError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = StepHandle(format!("{}-{}", self.step, n));

        tracing::info!(
            step = %self.step,
            %handle,
            command = %self.command,
            cwd = %repository_path.display(),
            "running step command"
        );

        let mut cmd = tokio::process::Command::new("bash");
        cmd.arg("-c")
            .arg(&self.command)
            .current_dir(repository_path)
            .env("SLUICE_REPO", repository_path)
            .env("SLUICE_STEP", &self.step)
            .envs(params.iter().map(|(k, v)| (param_env_name(k), v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| StepAdapterError::Launch(e.to_string()))?;

        let stdout: Tail = Arc::default();
        let stderr: Tail = Arc::default();
        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_tail(out, Arc::clone(&stdout)));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_tail(err, Arc::clone(&stderr)));
        }

        self.children
            .lock()
            .insert(handle.clone(), Running { child, stdout, stderr, readers, exited_at: None });
        Ok(handle)
    }

    async fn status(&self, handle: &StepHandle) -> Result<StepReport, StepAdapterError> {
        let mut children = self.children.lock();
        let running = children
            .get_mut(handle)
            .ok_or_else(|| StepAdapterError::UnknownHandle(handle.clone()))?;

        let exit = running
            .child
            .try_wait()
            .map_err(|e| StepAdapterError::Backend(format!("wait failed: {}", e)))?;
        let Some(exit) = exit else {
            return Ok(StepReport::running(None));
        };
        // Output is complete once both pipes hit EOF, or the grace runs out.
        if !running.readers.iter().all(JoinHandle::is_finished) {
            let exited_at = *running.exited_at.get_or_insert_with(Instant::now);
            if exited_at.elapsed() < OUTPUT_GRACE {
                return Ok(StepReport::running(None));
            }
            tracing::warn!(step = %self.step, %handle, "output still open after exit, reporting what was read");
        }

        let Some(done) = children.remove(handle) else {
            return Err(StepAdapterError::UnknownHandle(handle.clone()));
        };
        for reader in &done.readers {
            reader.abort();
        }
        let code = exit.code().unwrap_or(-1);
        let output = joined(&done.stdout);

        let report = if exit.success() {
            StepReport::completed(Some(serde_json::json!({
                "exit_code": code,
                "output": output,
            })))
        } else {
            let stderr = joined(&done.stderr);
            let detail = if stderr.is_empty() { output } else { stderr };
            let message = format!("exit code {}: {}", code, detail.trim());
            if code == EXIT_NOT_FOUND {
                StepReport::failed_terminal(message)
            } else {
                StepReport::failed(message)
            }
        };

        tracing::info!(step = %self.step, %handle, exit_code = code, "step command exited");
        Ok(report)
    }

    /// Kill the child and forget the handle; a background task reaps it.
    async fn stop(&self, handle: &StepHandle) -> Result<bool, StepAdapterError> {
        let mut running = self
            .children
            .lock()
            .remove(handle)
            .ok_or_else(|| StepAdapterError::UnknownHandle(handle.clone()))?;
        if let Err(e) = running.child.start_kill() {
            // Already exited on its own; still reap below.
            tracing::debug!(step = %self.step, %handle, error = %e, "kill failed");
        }
        tracing::info!(step = %self.step, %handle, "step command killed");

        let step = self.step.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = running.child.wait().await {
                tracing::warn!(%step, %handle, error = %e, "failed to reap stopped command");
            }
            for reader in &running.readers {
                reader.abort();
            }
        });
        Ok(true)
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
