// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process daemon driven over its Unix socket.

mod ingest;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sluice_daemon::lifecycle::{self, Config};
use sluice_daemon::{DaemonState, ListenCtx, Listener};
use sluice_wire::{self as protocol, Request, Response};
use tempfile::TempDir;
use tokio::net::UnixStream;
use tokio::sync::Notify;

const TIMEOUT: Duration = Duration::from_secs(10);

/// A running daemon over a temporary state directory.
pub struct TestDaemon {
    pub config: Config,
    pub state: DaemonState,
    pub repo: TempDir,
    _dir: TempDir,
}

impl TestDaemon {
    /// Start a daemon with `pipeline` as its `sluice.toml`.
    pub async fn start(pipeline: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let config = Config::under(dir.path().join("state"));
        std::fs::create_dir_all(&config.state_dir).unwrap();
        std::fs::write(&config.config_path, pipeline).unwrap();

        let lifecycle::StartupResult { daemon, listener } =
            lifecycle::startup(&config).await.unwrap();
        let ctx = Arc::new(ListenCtx {
            orchestrator: Arc::clone(&daemon.orchestrator),
            stages: Arc::clone(&daemon.stages),
            start_time: Instant::now(),
            shutdown: Arc::new(Notify::new()),
        });
        tokio::spawn(Listener::new(listener, ctx).run());
        Self { config, state: daemon, repo, _dir: dir }
    }

    pub fn repo_path(&self) -> &Path {
        self.repo.path()
    }

    /// One request, one connection.
    pub async fn send(&self, request: Request) -> Response {
        let stream = UnixStream::connect(&self.config.socket_path).await.unwrap();
        let (mut reader, mut writer) = stream.into_split();
        protocol::write_request(&mut writer, &request, TIMEOUT).await.unwrap();
        protocol::read_response(&mut reader, TIMEOUT).await.unwrap()
    }

    pub async fn stop(mut self) {
        self.state.shutdown(Duration::from_secs(5)).await.unwrap();
        assert!(!self.config.socket_path.exists());
    }
}
