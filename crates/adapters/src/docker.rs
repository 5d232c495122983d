// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker CLI driver for containerized agents.
//!
//! Builds `docker run` invocations with worktree and bus-config mounts,
//! resource limits, and network policy, and tracks container names for
//! emergency cleanup in case auto-remove fails.

use crate::subprocess::{self, run_with_timeout, SubprocessError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;

/// In-container mount point for the agent's worktree.
pub const WORKSPACE_MOUNT: &str = "/workspace";
/// In-container path of the read-only bus config.
pub const BUS_CONFIG_MOUNT: &str = "/arch/mcp-config.json";
/// Hostname containers use to reach the bus on the host.
pub const HOST_GATEWAY: &str = "host.docker.internal";

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("docker daemon unavailable: {0}")]
    Unavailable(String),

    #[error("failed to pull image {image}: {reason}")]
    Pull { image: String, reason: String },

    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
}

/// Network mode for a container, mirroring the sandbox config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Bridge,
    None,
    Host,
}

/// Everything needed to assemble a `docker run` for one agent.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub agent_id: String,
    pub image: String,
    pub worktree: PathBuf,
    pub bus_config: PathBuf,
    pub network: Network,
    pub memory_limit: Option<String>,
    pub cpus: Option<f64>,
    pub extra_mounts: Vec<String>,
    /// ANTHROPIC_API_KEY passthrough; absent keys log a warning upstream.
    pub api_key: Option<String>,
}

impl ContainerSpec {
    pub fn container_name(&self) -> String {
        container_name(&self.agent_id)
    }

    /// Arguments after `docker`, excluding the AI CLI command appended
    /// by the session supervisor.
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            self.container_name(),
            "-v".to_string(),
            format!("{}:{}", self.worktree.display(), WORKSPACE_MOUNT),
            "-v".to_string(),
            format!("{}:{}:ro", self.bus_config.display(), BUS_CONFIG_MOUNT),
            "-w".to_string(),
            WORKSPACE_MOUNT.to_string(),
        ];

        // Linux needs the host gateway wired explicitly; Docker Desktop
        // provides it natively on other platforms.
        if cfg!(target_os = "linux") {
            args.push("--add-host".to_string());
            args.push(format!("{HOST_GATEWAY}:host-gateway"));
        }

        if let Some(key) = &self.api_key {
            args.push("-e".to_string());
            args.push(format!("ANTHROPIC_API_KEY={key}"));
        }
        if let Some(memory) = &self.memory_limit {
            args.push("--memory".to_string());
            args.push(memory.clone());
        }
        if let Some(cpus) = self.cpus {
            args.push("--cpus".to_string());
            args.push(cpus.to_string());
        }
        match self.network {
            Network::Bridge => {}
            Network::None => {
                args.push("--network".to_string());
                args.push("none".to_string());
            }
            Network::Host => {
                args.push("--network".to_string());
                args.push("host".to_string());
            }
        }
        for mount in &self.extra_mounts {
            args.push("-v".to_string());
            args.push(format!("{mount}:{mount}:ro"));
        }

        args.push(self.image.clone());
        args
    }
}

pub fn container_name(agent_id: &str) -> String {
    format!("arch-{agent_id}")
}

/// Check the docker daemon is reachable.
pub async fn daemon_available() -> Result<(), DockerError> {
    let mut cmd = Command::new("docker");
    cmd.arg("info");
    match run_with_timeout(cmd, subprocess::DOCKER_TIMEOUT, "docker info").await {
        Ok(_) => Ok(()),
        Err(SubprocessError::Spawn { .. }) => {
            Err(DockerError::Unavailable("docker CLI not found".to_string()))
        }
        Err(e) => Err(DockerError::Unavailable(e.to_string())),
    }
}

/// Check an image exists locally.
pub async fn image_exists(image: &str) -> bool {
    let mut cmd = Command::new("docker");
    cmd.args(["image", "inspect", image]);
    run_with_timeout(cmd, subprocess::DOCKER_TIMEOUT, "docker image inspect").await.is_ok()
}

/// Pull an image (bounded at five minutes).
pub async fn pull_image(image: &str) -> Result<(), DockerError> {
    tracing::info!(image, "pulling container image");
    let mut cmd = Command::new("docker");
    cmd.args(["pull", image]);
    run_with_timeout(cmd, subprocess::PULL_TIMEOUT, "docker pull")
        .await
        .map_err(|e| DockerError::Pull { image: image.to_string(), reason: e.to_string() })?;
    Ok(())
}

/// `docker stop` with the given grace period (SIGTERM then SIGKILL).
pub async fn stop_container(name: &str, grace_secs: u64) -> Result<(), DockerError> {
    let mut cmd = Command::new("docker");
    cmd.args(["stop", "-t", &grace_secs.to_string(), name]);
    run_with_timeout(
        cmd,
        subprocess::DOCKER_TIMEOUT + std::time::Duration::from_secs(grace_secs),
        "docker stop",
    )
    .await?;
    Ok(())
}

/// Force-remove a container, ignoring not-found.
pub async fn force_remove(name: &str) {
    let mut cmd = Command::new("docker");
    cmd.args(["rm", "-f", name]);
    if let Err(e) = subprocess::run_unchecked(cmd, subprocess::DOCKER_TIMEOUT, "docker rm").await {
        tracing::warn!(name, error = %e, "failed to force-remove container");
    }
}

/// Containers registered for emergency cleanup.
///
/// Containers start with `--rm`, so normally they clean themselves up;
/// this set catches survivors when the daemon misbehaves or the harness
/// dies mid-run.
#[derive(Debug, Clone, Default)]
pub struct ContainerCleanup {
    names: Arc<Mutex<HashSet<String>>>,
}

impl ContainerCleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>) {
        self.names.lock().insert(name.into());
    }

    pub fn unregister(&self, name: &str) {
        self.names.lock().remove(name);
    }

    pub fn registered(&self) -> Vec<String> {
        self.names.lock().iter().cloned().collect()
    }

    /// Force-remove every registered container.
    pub async fn purge(&self) {
        let names: Vec<String> = self.names.lock().drain().collect();
        for name in names {
            force_remove(&name).await;
        }
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
