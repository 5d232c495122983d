// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn successful_command_returns_output() {
    let mut cmd = Command::new("echo");
    cmd.arg("hello");
    let output = run_with_timeout(cmd, Duration::from_secs(5), "echo").await.unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test]
async fn nonzero_exit_maps_to_failed() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo boom >&2; exit 3"]);
    let err = run_with_timeout(cmd, Duration::from_secs(5), "sh").await.unwrap_err();
    match err {
        SubprocessError::Failed { what, stderr } => {
            assert_eq!(what, "sh");
            assert_eq!(stderr, "boom");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_command_times_out() {
    let mut cmd = Command::new("sleep");
    cmd.arg("5");
    let err = run_with_timeout(cmd, Duration::from_millis(50), "sleep").await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn missing_binary_maps_to_spawn() {
    let cmd = Command::new("definitely-not-a-real-binary-xyz");
    let err = run_with_timeout(cmd, Duration::from_secs(1), "ghost").await.unwrap_err();
    assert!(matches!(err, SubprocessError::Spawn { .. }));
}

#[tokio::test]
async fn run_unchecked_tolerates_nonzero_exit() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "exit 7"]);
    let output = run_unchecked(cmd, Duration::from_secs(5), "sh").await.unwrap();
    assert_eq!(output.status.code(), Some(7));
}
