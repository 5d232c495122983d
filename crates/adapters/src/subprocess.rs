// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded subprocess execution.
//!
//! Every external CLI call in the harness goes through
//! [`run_with_timeout`] so a wedged `git`/`gh`/`docker` can never hang
//! the reactor. A timeout maps to a dedicated error kind; callers decide
//! retry vs surface.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Bound for git operations (worktree add/remove, merge, status).
pub const GIT_TIMEOUT: Duration = Duration::from_secs(30);
/// Bound for GitHub CLI calls.
pub const GH_TIMEOUT: Duration = Duration::from_secs(30);
/// Bound for docker daemon queries and stop.
pub const DOCKER_TIMEOUT: Duration = Duration::from_secs(60);
/// Bound for docker image pulls.
pub const PULL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{what} timed out after {}s", timeout.as_secs())]
    Timeout { what: String, timeout: Duration },

    #[error("{what} could not be started: {source}")]
    Spawn { what: String, source: std::io::Error },

    #[error("{what} failed: {stderr}")]
    Failed { what: String, stderr: String },
}

impl SubprocessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Run a command to completion within `timeout`.
///
/// Returns the raw [`Output`] on a zero exit; a non-zero exit maps to
/// [`SubprocessError::Failed`] carrying trimmed stderr.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    what: &str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    let fut = cmd.output();
    let output = match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(SubprocessError::Spawn { what: what.to_string(), source });
        }
        Err(_) => {
            tracing::warn!(what, timeout_secs = timeout.as_secs(), "external command timed out");
            return Err(SubprocessError::Timeout { what: what.to_string(), timeout });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(SubprocessError::Failed { what: what.to_string(), stderr });
    }

    Ok(output)
}

/// Like [`run_with_timeout`] but tolerates non-zero exits, returning the
/// raw output for the caller to inspect.
pub async fn run_unchecked(
    mut cmd: Command,
    timeout: Duration,
    what: &str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Spawn { what: what.to_string(), source }),
        Err(_) => Err(SubprocessError::Timeout { what: what.to_string(), timeout }),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
