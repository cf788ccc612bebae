// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts connections on the Unix socket and serves one request per
//! connection without blocking the job schedulers.

mod ingest;

use std::sync::Arc;
use std::time::Instant;

use sluice_engine::Orchestrator;
use sluice_wire::{self as protocol, Request, Response, PROTOCOL_VERSION};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::config::StageConfig;
use crate::env::ipc_timeout;

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub orchestrator: Arc<Orchestrator>,
    pub stages: Arc<Vec<StageConfig>>,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Run the accept loop, spawning a task per connection.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("Unix accept error: {}", e),
            }
        }
    }
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected")
        }
        ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
            warn!("Connection timeout")
        }
        _ => error!("Connection error: {}", e),
    }
}

/// Handle a single client connection.
///
/// The handler races against client disconnect detection, so an abandoned
/// `IngestWait` does not hold a task until its timeout.
pub(crate) async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let request = protocol::read_request(&mut reader, ipc_timeout()).await?;

    // Status polling is frequent; keep it out of info logs
    if matches!(request, Request::IngestStatus { .. } | Request::Ping | Request::Status) {
        debug!(request = ?request, "received request");
    } else {
        info!(request = ?request, "received request");
    }

    let response = tokio::select! {
        response = handle_request(request, ctx) => response,
        _ = detect_client_disconnect(&mut reader) => {
            debug!("Client disconnected, dropping handler");
            return Ok(());
        }
    };

    debug!("Sending response: {:?}", response);
    protocol::write_response(&mut writer, &response, ipc_timeout()).await?;
    Ok(())
}

/// One request per connection: after it, a read only returns on EOF.
async fn detect_client_disconnect<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}

pub(crate) async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                warn!(client = %version, daemon = PROTOCOL_VERSION, "protocol version mismatch");
            }
            Response::Hello { version: PROTOCOL_VERSION.to_string() }
        }

        Request::Status => Response::Status {
            uptime_secs: ctx.start_time.elapsed().as_secs(),
            jobs_active: ctx.orchestrator.active_count(),
            jobs_total: ctx.orchestrator.list().len(),
        },

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }

        Request::IngestStart { repository_path, steps, parameters, job_id } => {
            ingest::handle_start(ctx, repository_path, steps, parameters, job_id)
        }

        Request::IngestStatus { job_id } => ingest::handle_status(ctx, &job_id),

        Request::IngestCancel { job_id } => ingest::handle_cancel(ctx, &job_id),

        Request::IngestWait { job_id, timeout_ms } => {
            ingest::handle_wait(ctx, &job_id, timeout_ms).await
        }

        Request::ListJobs => ingest::handle_list(ctx),

        Request::ResourceStatus => ingest::handle_resources(ctx).await,
    }
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
