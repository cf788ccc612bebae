// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::CommandFactory;

use super::*;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn ingest_collects_steps_and_params() {
    let cli = Cli::try_parse_from([
        "sluice", "ingest", "/repos/demo", "--step", "summarize", "--step", "doc_link", "--param",
        "depth=2", "--wait", "--timeout", "5m", "-o", "json",
    ])
    .unwrap();

    assert_eq!(cli.output, OutputFormat::Json);
    let Commands::Ingest(args) = cli.command else {
        panic!("expected ingest");
    };
    assert_eq!(args.path, std::path::Path::new("/repos/demo"));
    assert_eq!(args.steps, ["summarize", "doc_link"]);
    assert_eq!(args.params, [("depth".to_string(), "2".to_string())]);
    assert!(args.wait);
    assert_eq!(args.timeout.as_deref(), Some("5m"));
}

#[test]
fn timeout_requires_wait_on_ingest() {
    assert!(Cli::try_parse_from(["sluice", "ingest", ".", "--timeout", "5m"]).is_err());
}

#[test]
fn malformed_param_is_rejected() {
    assert!(Cli::try_parse_from(["sluice", "ingest", ".", "--param", "depth"]).is_err());
}

#[yare::parameterized(
    status    = { &["sluice", "status", "job-1"] },
    cancel    = { &["sluice", "cancel", "job-1"] },
    wait      = { &["sluice", "wait", "job-1", "--timeout", "30s"] },
    list      = { &["sluice", "list"] },
    resources = { &["sluice", "resources"] },
    ping      = { &["sluice", "daemon", "ping"] },
    stop      = { &["sluice", "daemon", "stop"] },
)]
fn subcommands_parse(argv: &[&str]) {
    Cli::try_parse_from(argv).unwrap();
}
