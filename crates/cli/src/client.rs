// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client: one request per connection over the Unix socket.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use sluice_core::JobStatus;
use sluice_daemon::env::ipc_timeout;
use sluice_daemon::lifecycle::{Config, LifecycleError};
use sluice_wire::{
    self as protocol, CancelState, JobDetail, JobSummary, ProtocolError, Request,
    ResourceSummary, Response, StepSelection, PROTOCOL_VERSION,
};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running")]
    NotRunning,

    #[error("failed to start daemon: {0}")]
    StartFailed(String),

    #[error(transparent)]
    State(#[from] LifecycleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("daemon error: {0}")]
    Daemon(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl ClientError {
    pub fn is_not_running(&self) -> bool {
        matches!(self, ClientError::NotRunning)
    }
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Client for the daemon of the resolved state directory.
    pub fn connect() -> Result<Self, ClientError> {
        let config = Config::load()?;
        Ok(Self::at(config.socket_path))
    }

    pub fn at(socket_path: impl Into<PathBuf>) -> Self {
        Self { socket_path: socket_path.into() }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Connect, spawning `sluiced` in the background when nothing answers.
    pub async fn connect_or_start() -> Result<Self, ClientError> {
        let config = Config::load()?;
        let client = Self::at(&config.socket_path);
        match client.ping().await {
            Ok(()) => return Ok(client),
            Err(e) if e.is_not_running() => {}
            Err(e) => return Err(e),
        }
        spawn_daemon(&config).await?;
        Ok(client)
    }

    async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, ipc_timeout()).await
    }

    async fn send_with_timeout(
        &self,
        request: &Request,
        read_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::ConnectionRefused => ClientError::NotRunning,
            _ => ClientError::Io(e),
        })?;
        // The daemon treats EOF on our half as a disconnect, so keep the
        // writer open until the response has been read.
        let (mut reader, mut writer) = stream.into_split();
        protocol::write_request(&mut writer, request, ipc_timeout()).await?;
        let response = protocol::read_response(&mut reader, read_timeout).await?;
        drop(writer);
        Ok(response)
    }

    fn reject<T>(response: Response) -> Result<T, ClientError> {
        Err(match response {
            Response::Invalid { message } => ClientError::Invalid(message),
            Response::NotFound { job_id } => ClientError::NotFound(job_id),
            Response::Error { message } => ClientError::Daemon(message),
            other => ClientError::Unexpected(format!("{:?}", other)),
        })
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(&Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Self::reject(other),
        }
    }

    /// Version handshake; returns the daemon's version.
    pub async fn hello(&self) -> Result<String, ClientError> {
        let request = Request::Hello { version: PROTOCOL_VERSION.to_string() };
        match self.send(&request).await? {
            Response::Hello { version } => Ok(version),
            other => Self::reject(other),
        }
    }

    /// Returns `(uptime_secs, jobs_active, jobs_total)`.
    pub async fn status(&self) -> Result<(u64, usize, usize), ClientError> {
        match self.send(&Request::Status).await? {
            Response::Status { uptime_secs, jobs_active, jobs_total } => {
                Ok((uptime_secs, jobs_active, jobs_total))
            }
            other => Self::reject(other),
        }
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(&Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Self::reject(other),
        }
    }

    /// Start an ingest job; returns its id.
    pub async fn ingest(
        &self,
        repository_path: PathBuf,
        steps: StepSelection,
        parameters: HashMap<String, String>,
        job_id: Option<String>,
    ) -> Result<String, ClientError> {
        let request = Request::IngestStart { repository_path, steps, parameters, job_id };
        match self.send(&request).await? {
            Response::JobStarted { job_id } => Ok(job_id),
            other => Self::reject(other),
        }
    }

    pub async fn job(&self, job_id: &str) -> Result<JobDetail, ClientError> {
        let request = Request::IngestStatus { job_id: job_id.to_string() };
        match self.send(&request).await? {
            Response::Job { job } => Ok(*job),
            other => Self::reject(other),
        }
    }

    pub async fn cancel(&self, job_id: &str) -> Result<CancelState, ClientError> {
        let request = Request::IngestCancel { job_id: job_id.to_string() };
        match self.send(&request).await? {
            Response::Cancel { state, .. } => Ok(state),
            other => Self::reject(other),
        }
    }

    /// Block until the job is terminal or `timeout` elapses; returns
    /// `(finished, status)`.
    pub async fn wait(
        &self,
        job_id: &str,
        timeout: Duration,
    ) -> Result<(bool, JobStatus), ClientError> {
        let request = Request::IngestWait {
            job_id: job_id.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        };
        // The daemon holds the response for up to `timeout`
        let read_timeout = timeout.saturating_add(ipc_timeout());
        match self.send_with_timeout(&request, read_timeout).await? {
            Response::Waited { finished, status, .. } => Ok((finished, status)),
            other => Self::reject(other),
        }
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>, ClientError> {
        match self.send(&Request::ListJobs).await? {
            Response::Jobs { jobs } => Ok(jobs),
            other => Self::reject(other),
        }
    }

    pub async fn resources(&self) -> Result<ResourceSummary, ClientError> {
        match self.send(&Request::ResourceStatus).await? {
            Response::Resources { resources } => Ok(resources),
            other => Self::reject(other),
        }
    }
}

/// Locate the `sluiced` binary: next to this executable, else on PATH.
pub fn find_sluiced_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("sluiced")))
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from("sluiced"))
}

/// Spawn the daemon in its own process group and wait for its `READY` line.
async fn spawn_daemon(config: &Config) -> Result<(), ClientError> {
    let mut child = Command::new(find_sluiced_binary())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(|e| ClientError::StartFailed(e.to_string()))?;

    let Some(stdout) = child.stdout.take() else {
        return Err(ClientError::StartFailed("no stdout from daemon".to_string()));
    };
    let mut lines = BufReader::new(stdout).lines();
    let startup_timeout = ipc_timeout().saturating_mul(2);
    match tokio::time::timeout(startup_timeout, lines.next_line()).await {
        Ok(Ok(Some(line))) if line.trim() == "READY" => Ok(()),
        Ok(Ok(_)) => Err(ClientError::StartFailed(format!(
            "daemon exited during startup, see {}",
            config.log_path.display()
        ))),
        Ok(Err(e)) => Err(ClientError::Io(e)),
        Err(_) => Err(ClientError::StartFailed("timed out waiting for daemon".to_string())),
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
