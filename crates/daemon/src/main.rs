// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sluiced`: the ingestion orchestration daemon.

use std::process::ExitCode;
use std::sync::Arc;

use sluice_daemon::lifecycle::{self, Config};
use sluice_daemon::{env, ListenCtx, Listener};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Log to `<state_dir>/daemon.log`; the guard flushes on drop.
fn init_logging(config: &Config) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.state_dir)?;
    let file_name = config.log_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    let appender = tracing_appender::rolling::never(&config.state_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_new(env::log_filter()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sluiced: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let _guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("sluiced: cannot open log in {}: {}", config.state_dir.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "daemon failed");
            eprintln!("sluiced: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), lifecycle::LifecycleError> {
    let lifecycle::StartupResult { mut daemon, listener } = lifecycle::startup(&config).await?;

    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx {
        orchestrator: Arc::clone(&daemon.orchestrator),
        stages: Arc::clone(&daemon.stages),
        start_time: daemon.start_time,
        shutdown: Arc::clone(&shutdown),
    });
    tokio::spawn(Listener::new(listener, ctx).run());

    let reaper = Arc::clone(&daemon.orchestrator);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(env::reap_interval());
        loop {
            interval.tick().await;
            reaper.evict_expired();
        }
    });

    // Readiness marker for whoever spawned us
    println!("READY");
    info!(socket = %config.socket_path.display(), "listening");

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received ctrl-c"),
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = shutdown.notified() => info!("shutdown requested"),
    }

    daemon.shutdown(env::drain_timeout()).await
}
