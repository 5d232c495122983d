// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Containerized session supervisor.
//!
//! Same contract and output pipeline as the local variant, but the AI
//! CLI runs inside a Docker container with the worktree mounted at a
//! fixed path and the bus reached through the host gateway.

use crate::meter::TokenMeter;
use crate::session::{
    build_cli_args, drain_stderr, finish_session, pump_stream, wait_for_flag, write_bus_config,
    SessionError, SessionExit, SessionSpec, Supervision,
};
use arch_adapters::docker::{self, ContainerSpec};
use arch_adapters::ContainerCleanup;
use arch_core::{AgentId, AgentStatus, ExecHandle};
use arch_storage::{AgentPatch, AuditEvent, AuditLog, StateStore};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;

pub use arch_adapters::docker::HOST_GATEWAY;

/// An AI CLI session running inside a container.
pub struct ContainerSession {
    agent_id: AgentId,
    container_name: String,
    child: Arc<tokio::sync::Mutex<Option<tokio::process::Child>>>,
    finished: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    resume_token: Arc<Mutex<Option<String>>>,
    cleanup: ContainerCleanup,
}

impl ContainerSession {
    /// Start the container and the shared output pipeline.
    #[allow(clippy::too_many_arguments)]
    pub async fn spawn(
        spec: SessionSpec,
        container: ContainerSpec,
        prompt: &str,
        resume_token: Option<&str>,
        store: Arc<StateStore>,
        meter: Arc<TokenMeter>,
        audit: &AuditLog,
        cleanup: ContainerCleanup,
        exit_tx: mpsc::Sender<SessionExit>,
    ) -> Result<Self, SessionError> {
        write_bus_config(&spec.state_dir, spec.agent_id.as_str(), spec.mcp_port, true)
            .map_err(SessionError::ConfigWrite)?;

        if spec.skip_permissions {
            audit.append(AuditEvent::SkipPermissions, spec.agent_id.as_str(), &spec.role, "user");
        }

        let name = container.container_name();
        let mut args = container.run_args();
        args.push("claude".to_string());
        args.extend(build_cli_args(
            &spec.model,
            docker::BUS_CONFIG_MOUNT,
            spec.skip_permissions,
            resume_token,
            prompt,
        ));

        tracing::info!(agent_id = %spec.agent_id, container = %name, "spawning container session");

        let mut child = Command::new("docker")
            .args(&args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(SessionError::Spawn)?;

        // The container runs with --rm, but auto-remove can fail with
        // the daemon; keep a stop registered for emergency cleanup.
        cleanup.register(name.clone());

        let stdout = child.stdout.take();
        if let Some(stderr) = child.stderr.take() {
            drain_stderr(spec.agent_id.clone(), stderr);
        }

        meter.register_agent(spec.agent_id.as_str(), &spec.model);
        let patch = AgentPatch {
            status: Some(AgentStatus::Working),
            exec: Some(ExecHandle::Container { name: name.clone() }),
            ..Default::default()
        };
        if let Err(e) = store.update_agent(spec.agent_id.as_str(), patch) {
            tracing::warn!(agent_id = %spec.agent_id, error = %e, "failed to record container handle");
        }

        let session = Self {
            agent_id: spec.agent_id.clone(),
            container_name: name.clone(),
            child: Arc::new(tokio::sync::Mutex::new(Some(child))),
            finished: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            resume_token: Arc::new(Mutex::new(resume_token.map(str::to_string))),
            cleanup: cleanup.clone(),
        };

        let sup = Supervision { store, meter, exit_tx };
        let agent_id = spec.agent_id;
        let child_slot = Arc::clone(&session.child);
        let finished = Arc::clone(&session.finished);
        let stop_requested = Arc::clone(&session.stop_requested);
        let token_slot = Arc::clone(&session.resume_token);
        tokio::spawn(async move {
            if let Some(stdout) = stdout {
                pump_stream(&agent_id, stdout, &sup, &token_slot).await;
            }
            let exit_code = match child_slot.lock().await.take() {
                Some(mut child) => match child.wait().await {
                    Ok(status) => status.code().unwrap_or(-1),
                    Err(e) => {
                        tracing::warn!(%agent_id, error = %e, "failed to reap container session");
                        -1
                    }
                },
                None => 0,
            };
            // Auto-remove succeeded if the process exited; drop the
            // emergency registration.
            cleanup.unregister(&name);
            finish_session(&agent_id, exit_code, &finished, &stop_requested, &sup).await;
        });

        Ok(session)
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn is_running(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
    }

    pub fn resume_token(&self) -> Option<String> {
        self.resume_token.lock().clone()
    }

    /// Graceful stop via `docker stop`, then force-remove on timeout.
    pub async fn stop(&self, grace: Duration) -> bool {
        if !self.is_running() {
            return true;
        }

        self.stop_requested.store(true, Ordering::SeqCst);
        tracing::info!(agent_id = %self.agent_id, container = %self.container_name, "stopping container");
        if let Err(e) = docker::stop_container(&self.container_name, grace.as_secs()).await {
            tracing::warn!(container = %self.container_name, error = %e, "docker stop failed");
        }

        if wait_for_flag(&self.finished, grace).await {
            return true;
        }

        docker::force_remove(&self.container_name).await;
        self.cleanup.unregister(&self.container_name);
        wait_for_flag(&self.finished, Duration::from_secs(5)).await
    }
}
