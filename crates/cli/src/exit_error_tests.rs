// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    failed    = { ExitError::job_failed("job-1"), JOB_FAILED, "job job-1 failed" },
    cancelled = { ExitError::job_cancelled("job-1"), JOB_CANCELLED, "job job-1 was cancelled" },
    timed_out = { ExitError::timed_out("job-1"), TIMED_OUT, "timed out waiting for job job-1" },
)]
fn exit_error_constructors(err: ExitError, code: u8, message: &str) {
    assert_eq!(err.code, code);
    assert_eq!(err.to_string(), message);
}

#[yare::parameterized(
    not_found   = { ClientError::NotFound("job-x".into()), NOT_FOUND },
    invalid     = { ClientError::Invalid("unknown step 'embed'".into()), INVALID },
    not_running = { ClientError::NotRunning, NOT_RUNNING },
    daemon      = { ClientError::Daemon("store unavailable".into()), 1 },
)]
fn client_errors_map_to_exit_codes(err: ClientError, code: u8) {
    assert_eq!(exit_code(&anyhow::Error::new(err)), code);
}

#[test]
fn exit_error_carries_its_own_code() {
    let err = anyhow::Error::new(ExitError::timed_out("job-1"));
    assert_eq!(exit_code(&err), TIMED_OUT);
}

#[test]
fn plain_errors_exit_one() {
    assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
}
