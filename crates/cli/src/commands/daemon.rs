// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sluice daemon` - Daemon management commands

use std::process::Command;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use sluice_daemon::env::drain_timeout;

use crate::client::{find_sluiced_binary, DaemonClient};
use crate::exit_error::{ExitError, NOT_RUNNING};
use crate::output::{format_or_json, OutputFormat};

#[derive(Args, Debug)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Start the daemon (background unless --foreground)
    Start {
        /// Run in foreground (useful for debugging)
        #[arg(long)]
        foreground: bool,
    },
    /// Cancel active jobs and stop the daemon
    Stop,
    /// Check daemon status
    Status,
    /// Check that the daemon answers
    Ping,
}

pub async fn daemon(args: DaemonArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        DaemonCommand::Start { foreground } => start(foreground).await,
        DaemonCommand::Stop => stop().await,
        DaemonCommand::Status => status(format).await,
        DaemonCommand::Ping => ping(format).await,
    }
}

async fn start(foreground: bool) -> Result<()> {
    if foreground {
        let status = Command::new(find_sluiced_binary()).status()?;
        if !status.success() {
            return Err(anyhow!("Daemon exited with status: {}", status));
        }
        return Ok(());
    }

    let client = DaemonClient::connect()?;
    if let Ok((uptime, _, _)) = client.status().await {
        println!("Daemon already running (uptime: {})", format_uptime(uptime));
        return Ok(());
    }
    DaemonClient::connect_or_start().await?;
    println!("Daemon started");
    Ok(())
}

async fn stop() -> Result<()> {
    let client = DaemonClient::connect()?;
    match client.shutdown().await {
        Ok(()) => {}
        Err(e) if e.is_not_running() => {
            println!("Daemon not running");
            return Ok(());
        }
        Err(e) => return Err(anyhow!("Failed to stop daemon: {}", e)),
    }

    // The daemon removes its socket last, after draining jobs
    let deadline = tokio::time::Instant::now() + drain_timeout() + Duration::from_secs(2);
    while client.socket_path().exists() {
        if tokio::time::Instant::now() >= deadline {
            return Err(anyhow!("Daemon did not exit within {:?}", drain_timeout()));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    println!("Daemon stopped");
    Ok(())
}

async fn status(format: OutputFormat) -> Result<()> {
    let client = DaemonClient::connect()?;
    let (uptime, jobs_active, jobs_total) = match client.status().await {
        Ok(result) => result,
        Err(e) if e.is_not_running() => return print_not_running(format),
        Err(e) => return Err(anyhow!("{}", e)),
    };
    let version = client.hello().await.unwrap_or_else(|_| "unknown".to_string());

    let obj = serde_json::json!({
        "status": "running",
        "version": version,
        "uptime_secs": uptime,
        "uptime": format_uptime(uptime),
        "jobs_active": jobs_active,
        "jobs_total": jobs_total,
    });
    format_or_json(format, &obj, || {
        println!("Status: running");
        println!("Version: {}", version);
        println!("Uptime: {}", format_uptime(uptime));
        println!("Jobs: {} active, {} retained", jobs_active, jobs_total);
    })
}

async fn ping(format: OutputFormat) -> Result<()> {
    let client = DaemonClient::connect()?;
    match client.ping().await {
        Ok(()) => format_or_json(format, &serde_json::json!({ "pong": true }), || println!("pong")),
        Err(e) if e.is_not_running() => {
            print_not_running(format)?;
            Err(ExitError::new(NOT_RUNNING, "").into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_not_running(format: OutputFormat) -> Result<()> {
    let obj = serde_json::json!({ "status": "not_running" });
    format_or_json(format, &obj, || println!("Daemon not running"))
}

fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
