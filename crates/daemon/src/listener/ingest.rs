// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingest request handlers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use sluice_engine::{CancelOutcome, StartRequest};
use sluice_wire::{
    CancelState, JobDetail, JobSummary, ResourceSummary, Response, StepSelection,
};
use tracing::warn;

use super::ListenCtx;
use crate::pipeline;

pub(super) fn handle_start(
    ctx: &ListenCtx,
    repository_path: PathBuf,
    steps: StepSelection,
    parameters: HashMap<String, String>,
    job_id: Option<String>,
) -> Response {
    let plan = match pipeline::resolve(steps, &ctx.stages) {
        Ok(plan) => plan,
        Err(e) => return Response::Invalid { message: e.to_string() },
    };
    let mut request = StartRequest::new(repository_path, plan).parameters(parameters);
    if let Some(id) = job_id {
        request = request.job_id(id);
    }
    match ctx.orchestrator.start(request) {
        Ok(id) => Response::JobStarted { job_id: id.to_string() },
        Err(e) => Response::Invalid { message: e.to_string() },
    }
}

pub(super) fn handle_status(ctx: &ListenCtx, job_id: &str) -> Response {
    match ctx.orchestrator.status(job_id) {
        Some(job) => Response::Job { job: Box::new(JobDetail::from(&job)) },
        None => Response::NotFound { job_id: job_id.to_string() },
    }
}

pub(super) fn handle_cancel(ctx: &ListenCtx, job_id: &str) -> Response {
    let state = match ctx.orchestrator.cancel(job_id) {
        CancelOutcome::Cancelled => CancelState::Cancelled,
        CancelOutcome::AlreadyTerminal => CancelState::AlreadyTerminal,
        CancelOutcome::NotFound => return Response::NotFound { job_id: job_id.to_string() },
    };
    Response::Cancel { job_id: job_id.to_string(), state }
}

pub(super) async fn handle_wait(ctx: &ListenCtx, job_id: &str, timeout_ms: u64) -> Response {
    let Some(finished) = ctx.orchestrator.wait(job_id, Duration::from_millis(timeout_ms)).await
    else {
        return Response::NotFound { job_id: job_id.to_string() };
    };
    // Evicted between the wait and the snapshot
    let Some(job) = ctx.orchestrator.status(job_id) else {
        return Response::NotFound { job_id: job_id.to_string() };
    };
    Response::Waited { job_id: job_id.to_string(), finished, status: job.status() }
}

pub(super) fn handle_list(ctx: &ListenCtx) -> Response {
    let jobs = ctx.orchestrator.list().iter().map(JobSummary::from).collect();
    Response::Jobs { jobs }
}

pub(super) async fn handle_resources(ctx: &ListenCtx) -> Response {
    let tokens = ctx.orchestrator.tokens();
    match tokens.status().await {
        Ok(status) => Response::Resources {
            resources: ResourceSummary {
                bucket: tokens.bucket().to_string(),
                available_tokens: status.available,
                max_tokens: status.max,
                held_tokens: status.held,
            },
        },
        Err(e) => {
            warn!(error = %e, "resource status unavailable");
            Response::Error { message: e.to_string() }
        }
    }
}
