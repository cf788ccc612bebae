// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingest lifecycle over the socket with real step commands.

use std::collections::HashMap;

use sluice_core::{JobStatus, StepStatus};
use sluice_wire::{CancelState, Request, Response, StepSelection};

use super::TestDaemon;

const PIPELINE: &str = r#"
[engine]
max_tokens = 2
poll_interval_ms = 20

[counter_store]
kind = "memory"

[[stage]]
name = "filesystem"
command = "test -d \"$SLUICE_REPO\""

[[stage]]
name = "structure"
depends_on = ["filesystem"]
command = "echo \"depth=$SLUICE_PARAM_DEPTH\""

[[stage]]
name = "summarize"
depends_on = ["structure"]
max_retries = 0
command = "echo 'model offline' >&2; exit 3"

[[stage]]
name = "doc_link"
depends_on = ["structure"]
command = "sleep 30"
"#;

fn start_request(daemon: &TestDaemon, steps: &[&str]) -> Request {
    Request::IngestStart {
        repository_path: daemon.repo_path().to_path_buf(),
        steps: StepSelection::Names(steps.iter().map(|s| s.to_string()).collect()),
        parameters: HashMap::from([("depth".to_string(), "2".to_string())]),
        job_id: None,
    }
}

async fn start(daemon: &TestDaemon, steps: &[&str]) -> String {
    match daemon.send(start_request(daemon, steps)).await {
        Response::JobStarted { job_id } => job_id,
        other => panic!("expected JobStarted, got {other:?}"),
    }
}

async fn wait(daemon: &TestDaemon, job_id: &str) -> Response {
    daemon.send(Request::IngestWait { job_id: job_id.to_string(), timeout_ms: 10_000 }).await
}

#[tokio::test]
async fn selected_stage_runs_with_its_dependencies() {
    let daemon = TestDaemon::start(PIPELINE).await;
    let job_id = start(&daemon, &["structure"]).await;

    assert_eq!(
        wait(&daemon, &job_id).await,
        Response::Waited { job_id: job_id.clone(), finished: true, status: JobStatus::Completed }
    );
    let Response::Job { job } = daemon.send(Request::IngestStatus { job_id }).await else {
        panic!("expected job snapshot");
    };
    assert_eq!(job.steps.keys().collect::<Vec<_>>(), ["filesystem", "structure"]);
    let structure = &job.steps["structure"];
    assert_eq!(structure.status, StepStatus::Completed);
    let output = structure.result.as_ref().and_then(|r| r["output"].as_str()).unwrap();
    assert!(output.contains("depth=2"), "{output}");

    daemon.stop().await;
}

#[tokio::test]
async fn failing_command_fails_the_job_with_its_stderr() {
    let daemon = TestDaemon::start(PIPELINE).await;
    let job_id = start(&daemon, &["summarize"]).await;

    assert!(matches!(
        wait(&daemon, &job_id).await,
        Response::Waited { finished: true, status: JobStatus::Failed, .. }
    ));
    let Response::Job { job } = daemon.send(Request::IngestStatus { job_id }).await else {
        panic!("expected job snapshot");
    };
    let summarize = &job.steps["summarize"];
    assert_eq!(summarize.status, StepStatus::Failed);
    assert_eq!(summarize.retry_count, 1);
    assert_eq!(summarize.last_error.as_deref(), Some("exit code 3: model offline"));

    daemon.stop().await;
}

#[tokio::test]
async fn cancel_stops_a_running_command() {
    let daemon = TestDaemon::start(PIPELINE).await;
    let job_id = start(&daemon, &["doc_link"]).await;

    // Let filesystem and structure finish so doc_link is running
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    loop {
        let Response::Job { job } =
            daemon.send(Request::IngestStatus { job_id: job_id.clone() }).await
        else {
            panic!("expected job snapshot");
        };
        if job.steps["doc_link"].status == StepStatus::Running {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "doc_link never started");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(
        daemon.send(Request::IngestCancel { job_id: job_id.clone() }).await,
        Response::Cancel { job_id: job_id.clone(), state: CancelState::Cancelled }
    );
    assert!(matches!(
        wait(&daemon, &job_id).await,
        Response::Waited { finished: true, status: JobStatus::Cancelled, .. }
    ));
    let Response::Resources { resources } = daemon.send(Request::ResourceStatus).await else {
        panic!("expected resources");
    };
    assert_eq!((resources.available_tokens, resources.held_tokens), (2, 0));

    daemon.stop().await;
}

#[tokio::test]
async fn unknown_stage_and_unknown_job_are_reported() {
    let daemon = TestDaemon::start(PIPELINE).await;

    assert_eq!(
        daemon.send(start_request(&daemon, &["embed"])).await,
        Response::Invalid { message: "unknown step 'embed'".into() }
    );
    assert_eq!(
        daemon.send(Request::IngestStatus { job_id: "job-missing".into() }).await,
        Response::NotFound { job_id: "job-missing".into() }
    );
    assert_eq!(daemon.send(Request::ListJobs).await, Response::Jobs { jobs: vec![] });

    daemon.stop().await;
}
