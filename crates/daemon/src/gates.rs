// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup gates: permission assent, container readiness, provider
//! availability.
//!
//! The permission prompt is synchronous terminal I/O, so the caller
//! offloads it with `spawn_blocking`; everything here is written against
//! generic reader/writer handles for testability.

use arch_adapters::docker;
use arch_adapters::{GithubClient, GithubError};
use arch_config::ArchConfig;
use std::io::{BufRead, Write};

/// Prominently display the skip-permissions roles and require explicit
/// assent. Returns false (abort startup) on anything but `y`/`yes`.
pub fn confirm_skip_permissions<R: BufRead, W: Write>(
    roles: &[&str],
    mut input: R,
    mut output: W,
) -> std::io::Result<bool> {
    writeln!(output)?;
    writeln!(output, "{}", "=".repeat(60))?;
    writeln!(output, "WARNING: DANGEROUS PERMISSIONS REQUESTED")?;
    writeln!(output, "{}", "=".repeat(60))?;
    writeln!(output)?;
    writeln!(output, "The following agent roles have skip_permissions enabled:")?;
    for role in roles {
        writeln!(output, "  - {role}")?;
    }
    writeln!(output)?;
    writeln!(output, "These agents will execute commands without per-tool confirmation.")?;
    write!(output, "Continue? [y/N]: ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Container gate: daemon reachable, every required image present
/// (pulling the missing ones). Fatal only when a role needs a sandbox.
pub async fn container_gate(config: &ArchConfig) -> Result<(), String> {
    let roles = config.sandboxed_roles();
    if roles.is_empty() {
        return Ok(());
    }

    docker::daemon_available().await.map_err(|e| e.to_string())?;
    tracing::info!(?roles, "containerized roles verified against the docker daemon");

    for image in config.required_images() {
        if !docker::image_exists(image).await {
            tracing::info!(image, "image missing locally, pulling");
            docker::pull_image(image).await.map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

/// Provider gate: warn-only. Returns the client when usable, otherwise
/// the reason the tool family is disabled for this run.
pub async fn github_gate(config: &ArchConfig) -> Result<Option<GithubClient>, String> {
    let Some(github) = &config.github else {
        return Ok(None);
    };

    let client = GithubClient::new(github.repo.clone());
    match client.check().await {
        Ok(()) => {
            tracing::info!(repo = %github.repo, "hosting provider verified");
            Ok(Some(client))
        }
        Err(e @ GithubError::CliMissing)
        | Err(e @ GithubError::Unauthenticated(_))
        | Err(e @ GithubError::RepoInaccessible { .. }) => Err(e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
#[path = "gates_tests.rs"]
mod tests;
