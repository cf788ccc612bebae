// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sluice_adapters::{FakeOutcome, FakeStepAdapter, MemoryCounterStore};
use sluice_core::test_support::{job_with, linear_specs};
use sluice_core::{FakeClock, JobStatus, StepSpec};

struct Harness {
    controller: JobController,
    runner: JobRunner<FakeClock>,
    done: watch::Sender<bool>,
    tokens: Arc<ResourceTokenManager>,
}

fn config() -> EngineConfig {
    EngineConfig::default()
        .poll_interval(Duration::from_millis(10))
        .acquire_timeout(Duration::from_secs(5))
}

fn harness(specs: &[StepSpec], registry: StepRegistry, config: EngineConfig) -> Harness {
    let (controller, done) = JobController::new(job_with(specs));
    let tokens = Arc::new(ResourceTokenManager::new(Arc::new(MemoryCounterStore::new()), &config));
    let runner = JobRunner::new(
        &controller,
        Arc::new(registry),
        Arc::clone(&tokens),
        Arc::new(config),
        FakeClock::new(),
    );
    Harness { controller, runner, done, tokens }
}

impl Harness {
    async fn run(self) -> (Job, Arc<ResourceTokenManager>) {
        let controller = self.controller.clone();
        self.runner.run(self.done).await;
        assert!(controller.is_done());
        (controller.snapshot(), self.tokens)
    }
}

fn registry_of(names: &[&str], adapter: &FakeStepAdapter) -> StepRegistry {
    let mut registry = StepRegistry::new();
    for name in names {
        registry.register(*name, adapter.clone());
    }
    registry
}

#[tokio::test(start_paused = true)]
async fn pipeline_runs_in_dependency_order() {
    let names = ["filesystem", "structure", "summarize"];
    let adapter = FakeStepAdapter::succeeding();
    let h = harness(&linear_specs(&names), registry_of(&names, &adapter), config());

    let (job, tokens) = h.run().await;

    assert_eq!(job.status(), JobStatus::Completed);
    assert!(job.finished_at_ms.is_some());
    assert_eq!(adapter.run_count(), 3);
    assert_eq!(adapter.max_active(), 1);
    for name in names {
        let step = job.step(name).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.progress, Some(1.0));
    }
    let status = tokens.status().await.unwrap();
    assert_eq!((status.available, status.held), (status.max, 0));
}

#[tokio::test(start_paused = true)]
async fn cycle_that_escaped_validation_deadlocks() {
    let specs = vec![
        StepSpec::new("a").depends_on(["b"]),
        StepSpec::new("b").depends_on(["a"]),
        StepSpec::new("c"),
    ];
    let adapter = FakeStepAdapter::succeeding();
    let h = harness(&specs, registry_of(&["a", "b", "c"], &adapter), config());

    let (job, _) = h.run().await;

    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.step("c").unwrap().status, StepStatus::Completed);
    for name in ["a", "b"] {
        let step = job.step(name).unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.last_error.as_deref(), Some(DEADLOCK_ERROR));
    }
    assert_eq!(adapter.run_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_until_success() {
    let adapter = FakeStepAdapter::succeeding().fail_times(2, "connection reset");
    let specs = [StepSpec::new("filesystem").max_retries(2).back_off_secs(1)];
    let h = harness(&specs, registry_of(&["filesystem"], &adapter), config());

    let started = tokio::time::Instant::now();
    let (job, _) = h.run().await;

    let step = job.step("filesystem").unwrap();
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.retry_count, 2);
    assert!(step.last_error.is_none());
    assert_eq!(adapter.run_count(), 3);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn exhausted_step_fails_dependents_without_running_them() {
    let failing = FakeStepAdapter::failing("disk unreadable");
    let healthy = FakeStepAdapter::succeeding();
    let registry = StepRegistry::new()
        .with("filesystem", failing.clone())
        .with("structure", healthy.clone())
        .with("summarize", healthy.clone());
    let specs = vec![
        StepSpec::new("filesystem").max_retries(2),
        StepSpec::new("structure").depends_on(["filesystem"]),
        StepSpec::new("summarize").depends_on(["structure"]),
    ];
    let h = harness(&specs, registry, config());

    let (job, _) = h.run().await;

    assert_eq!(job.status(), JobStatus::Failed);
    let root = job.step("filesystem").unwrap();
    assert_eq!(root.retry_count, 3);
    assert_eq!(root.last_error.as_deref(), Some("disk unreadable"));
    assert_eq!(failing.run_count(), 3);
    assert_eq!(healthy.run_count(), 0);
    for name in ["structure", "summarize"] {
        assert_eq!(
            job.step(name).unwrap().last_error.as_deref(),
            Some("dependency 'filesystem' failed")
        );
    }
}

#[tokio::test(start_paused = true)]
async fn non_retryable_failure_skips_budget() {
    let adapter =
        FakeStepAdapter::succeeding().then(FakeOutcome::FailTerminal("not a git repository".into()));
    let specs = [StepSpec::new("filesystem").max_retries(4)];
    let h = harness(&specs, registry_of(&["filesystem"], &adapter), config());

    let (job, _) = h.run().await;

    let step = job.step("filesystem").unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.retry_count, 1);
    assert_eq!(adapter.run_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn token_bucket_bounds_concurrency() {
    let names = ["a", "b", "c", "d"];
    let adapter = FakeStepAdapter::succeeding().with_duration(Duration::from_secs(3));
    let specs: Vec<StepSpec> = names.iter().map(|n| StepSpec::new(*n)).collect();
    let h = harness(&specs, registry_of(&names, &adapter), config().max_tokens(2));

    let (job, tokens) = h.run().await;

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(adapter.max_active(), 2);
    assert_eq!(tokens.status().await.unwrap().available, 2);
}

#[tokio::test(start_paused = true)]
async fn tokenless_steps_ignore_the_bucket() {
    let adapter = FakeStepAdapter::succeeding();
    let specs = [StepSpec::new("doc_link").uses_token(false)];
    let h = harness(&specs, registry_of(&["doc_link"], &adapter), config().max_tokens(0));

    let (job, _) = h.run().await;
    assert_eq!(job.status(), JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn token_timeout_is_a_failed_attempt() {
    let adapter = FakeStepAdapter::succeeding();
    let specs = [StepSpec::new("summarize")];
    let config = config().max_tokens(1).acquire_timeout(Duration::from_secs(1));
    let h = harness(&specs, registry_of(&["summarize"], &adapter), config);
    let hog = h.tokens.acquire(Duration::ZERO).await.unwrap();

    let (job, tokens) = h.run().await;

    let step = job.step("summarize").unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.retry_count, 1);
    assert!(step.last_error.as_deref().unwrap_or_default().contains("resource token"));
    assert!(step.started_at_ms.is_none());
    assert_eq!(adapter.run_count(), 0);
    tokens.release(hog).await;
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_running_step_and_cancels_pending() {
    let adapter = FakeStepAdapter::hanging();
    let h = harness(&linear_specs(&["a", "b"]), registry_of(&["a", "b"], &adapter), config());
    let controller = h.controller.clone();
    let task = tokio::spawn(h.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(controller.snapshot().step("a").unwrap().status, StepStatus::Running);
    controller.cancel(5);

    let (job, tokens) = task.await.unwrap();
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert_eq!(job.step("a").unwrap().status, StepStatus::Stopped);
    assert_eq!(job.step("b").unwrap().status, StepStatus::Cancelled);
    assert_eq!(adapter.run_count(), 1);
    assert_eq!(tokens.status().await.unwrap().held, 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_without_stop_hook_discards_result() {
    let adapter = FakeStepAdapter::succeeding().with_duration(Duration::from_secs(10)).without_stop();
    let h = harness(&[StepSpec::new("a")], registry_of(&["a"], &adapter), config());
    let controller = h.controller.clone();
    let task = tokio::spawn(h.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    controller.cancel(5);
    assert_eq!(controller.snapshot().status(), JobStatus::Running);

    let (job, _) = task.await.unwrap();
    let step = job.step("a").unwrap();
    assert_eq!(step.status, StepStatus::Cancelled);
    assert!(step.result.is_none());
    assert_eq!(job.status(), JobStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_ends_retries() {
    let adapter = FakeStepAdapter::failing("flaky");
    let specs = [StepSpec::new("a").max_retries(5).back_off_secs(60)];
    let h = harness(&specs, registry_of(&["a"], &adapter), config());
    let controller = h.controller.clone();
    let task = tokio::spawn(h.run());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(controller.snapshot().step("a").unwrap().status, StepStatus::Pending);
    controller.cancel(5);

    let (job, _) = task.await.unwrap();
    assert_eq!(job.step("a").unwrap().status, StepStatus::Cancelled);
    assert_eq!(adapter.run_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unregistered_step_fails_terminally() {
    let specs = linear_specs(&["filesystem", "structure"]);
    let h = harness(&specs, StepRegistry::new(), config());

    let (job, _) = h.run().await;

    let step = job.step("filesystem").unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert!(step.last_error.as_deref().unwrap_or_default().contains("no adapter"));
    assert_eq!(
        job.step("structure").unwrap().last_error.as_deref(),
        Some("dependency 'filesystem' failed")
    );
}

#[tokio::test(start_paused = true)]
async fn activity_log_records_attempts() {
    let dir = tempfile::TempDir::new().unwrap();
    let adapter = FakeStepAdapter::succeeding().fail_times(1, "flaky");
    let specs = [StepSpec::new("filesystem").max_retries(1)];
    let h = harness(&specs, registry_of(&["filesystem"], &adapter), config().log_dir(dir.path()));

    h.run().await;

    let log = std::fs::read_to_string(crate::job_log_path(dir.path(), "job-test")).unwrap();
    let tail: Vec<&str> = log.lines().map(|l| &l[21..]).collect();
    assert_eq!(
        tail,
        [
            "[job] started",
            "[filesystem] started (attempt 1)",
            "[filesystem] failed: flaky",
            "[filesystem] retrying in 0s",
            "[filesystem] started (attempt 2)",
            "[filesystem] completed",
            "[job] finished: completed",
        ]
    );
}
