// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handle to one job: its record, cancellation token, and completion signal.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sluice_core::{Job, JobId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Result of a cancel request. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    AlreadyTerminal,
    NotFound,
}

sluice_core::simple_display! {
    CancelOutcome {
        Cancelled => "cancelled",
        AlreadyTerminal => "already terminal",
        NotFound => "not found",
    }
}

/// Owns a job for its lifetime. The scheduler holds the other ends.
#[derive(Clone)]
pub struct JobController {
    id: JobId,
    job: Arc<Mutex<Job>>,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

impl JobController {
    /// Build a controller plus the completion sender for the scheduler.
    pub fn new(job: Job) -> (Self, watch::Sender<bool>) {
        let (done_tx, done) = watch::channel(false);
        let controller = Self {
            id: job.id.clone(),
            job: Arc::new(Mutex::new(job)),
            cancel: CancellationToken::new(),
            done,
        };
        (controller, done_tx)
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub(crate) fn job(&self) -> Arc<Mutex<Job>> {
        Arc::clone(&self.job)
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cloned view of the job record.
    pub fn snapshot(&self) -> Job {
        self.job.lock().clone()
    }

    /// True once the scheduler loop has finished.
    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    /// Flag the job cancelled, cancel pending steps, and wake the step tasks
    /// so running ones get their stop hook called. Idempotent.
    pub fn cancel(&self, epoch_ms: u64) -> CancelOutcome {
        if self.is_done() {
            return CancelOutcome::AlreadyTerminal;
        }
        let running = {
            let mut job = self.job.lock();
            if job.cancel_requested {
                return CancelOutcome::Cancelled;
            }
            job.request_cancel(epoch_ms)
        };
        tracing::info!(job_id = %self.id, ?running, "job cancellation requested");
        self.cancel.cancel();
        CancelOutcome::Cancelled
    }

    /// Wait up to `timeout` for the job to finish. Returns whether it did.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut done = self.done.clone();
        let signalled = tokio::time::timeout(timeout, done.wait_for(|finished| *finished))
            .await
            .map(|r| r.is_ok());
        match signalled {
            Ok(true) => true,
            // Sender gone: the scheduler task ended without signalling.
            Ok(false) => *done.borrow(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for JobController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobController")
            .field("id", &self.id)
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
