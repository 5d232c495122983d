// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local session supervisor: one AI CLI subprocess per agent.
//!
//! The supervisor owns the subprocess, parses its stream-json stdout
//! into the token meter, records the resume token, and runs the exit
//! handler exactly once whether the stream ends naturally or an external
//! stop wins the race. stderr is actively drained so a full pipe can
//! never deadlock the child.

use crate::meter::{StreamEvent, TokenMeter};
use arch_core::{AgentId, AgentStatus, ExecHandle, HARNESS, LEAD_AGENT};
use arch_storage::{AgentPatch, AuditEvent, AuditLog, StateStore};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to write bus config: {0}")]
    ConfigWrite(std::io::Error),

    #[error("failed to spawn AI CLI: {0}")]
    Spawn(std::io::Error),
}

/// Everything needed to start one agent session.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub agent_id: AgentId,
    pub role: String,
    pub model: String,
    pub worktree: PathBuf,
    pub skip_permissions: bool,
    pub mcp_port: u16,
    pub state_dir: PathBuf,
}

/// Delivered to the orchestrator when a session's exit handler runs.
#[derive(Debug, Clone)]
pub struct SessionExit {
    pub agent_id: AgentId,
    pub exit_code: i32,
}

/// Write the per-agent bus config file.
///
/// Containerized agents reach the host through the platform gateway
/// name instead of localhost.
pub fn write_bus_config(
    state_dir: &Path,
    agent_id: &str,
    mcp_port: u16,
    for_container: bool,
) -> std::io::Result<PathBuf> {
    let host = if for_container { crate::container::HOST_GATEWAY } else { "localhost" };
    let config = serde_json::json!({
        "mcpServers": {
            "arch": {
                "type": "sse",
                "url": format!("http://{host}:{mcp_port}/sse/{agent_id}"),
            }
        }
    });
    let path = state_dir.join(format!("{agent_id}-mcp.json"));
    std::fs::write(&path, serde_json::to_vec_pretty(&config)?)?;
    Ok(path)
}

/// Arguments for the AI CLI, shared by the local and container paths.
pub fn build_cli_args(
    model: &str,
    bus_config: &str,
    skip_permissions: bool,
    resume_token: Option<&str>,
    prompt: &str,
) -> Vec<String> {
    let mut args = vec![
        "--model".to_string(),
        model.to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--mcp-config".to_string(),
        bus_config.to_string(),
        "--print".to_string(),
    ];
    if skip_permissions {
        args.push("--dangerously-skip-permissions".to_string());
    }
    match resume_token {
        Some(token) => {
            args.push("--resume".to_string());
            args.push(token.to_string());
        }
        None => args.push(prompt.to_string()),
    }
    args
}

/// Shared supervisor internals used by both execution variants.
pub(crate) struct Supervision {
    pub store: Arc<StateStore>,
    pub meter: Arc<TokenMeter>,
    pub exit_tx: mpsc::Sender<SessionExit>,
}

/// Read the agent's stdout to EOF, routing each line through the meter.
///
/// Usage events flow into the agent's stored totals; the result event's
/// session id is captured as the resume token and persisted.
pub(crate) async fn pump_stream<R: AsyncRead + Unpin>(
    agent_id: &AgentId,
    reader: R,
    sup: &Supervision,
    resume_token: &Arc<Mutex<Option<String>>>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(%agent_id, error = %e, "error reading agent stdout");
                break;
            }
        };

        match sup.meter.observe_line(agent_id.as_str(), &line) {
            Some(StreamEvent::Usage { .. }) => {
                if let Some(totals) = sup.meter.totals(agent_id.as_str()) {
                    if let Err(e) = sup.store.update_usage(agent_id.as_str(), totals) {
                        tracing::warn!(%agent_id, error = %e, "failed to record usage");
                    }
                }
            }
            Some(StreamEvent::Result { session_id: Some(token) }) => {
                *resume_token.lock() = Some(token.clone());
                let patch = AgentPatch { resume_token: Some(token), ..Default::default() };
                if let Err(e) = sup.store.update_agent(agent_id.as_str(), patch) {
                    tracing::warn!(%agent_id, error = %e, "failed to record resume token");
                }
            }
            _ => {}
        }
    }
}

/// Exit handler, guarded so the stream-end path and an external stop
/// cannot both fire it.
///
/// A non-zero exit is only unexpected when nobody asked the session to
/// stop; a kill during teardown or shutdown must not flag the agent as
/// errored.
pub(crate) async fn finish_session(
    agent_id: &AgentId,
    exit_code: i32,
    finished: &AtomicBool,
    stop_requested: &AtomicBool,
    sup: &Supervision,
) {
    if finished.swap(true, Ordering::SeqCst) {
        return;
    }

    tracing::info!(%agent_id, exit_code, "session exited");

    if exit_code != 0 && !stop_requested.load(Ordering::SeqCst) {
        let patch = AgentPatch { status: Some(AgentStatus::Error), ..Default::default() };
        if let Err(e) = sup.store.update_agent(agent_id.as_str(), patch) {
            tracing::warn!(%agent_id, error = %e, "failed to mark agent errored");
        }
        sup.store.append_message(
            HARNESS,
            LEAD_AGENT,
            &format!(
                "Agent {agent_id} exited unexpectedly with code {exit_code}. \
                 Check state/agents.json for details."
            ),
        );
    } else {
        // Do not clobber a terminal status an agent already reported.
        let already_terminal =
            sup.store.agent(agent_id.as_str()).map(|a| a.status.is_terminal()).unwrap_or(false);
        if !already_terminal {
            let patch = AgentPatch { status: Some(AgentStatus::Done), ..Default::default() };
            if let Err(e) = sup.store.update_agent(agent_id.as_str(), patch) {
                tracing::warn!(%agent_id, error = %e, "failed to mark agent done");
            }
        }
    }

    let exit = SessionExit { agent_id: agent_id.clone(), exit_code };
    if let Err(e) = sup.exit_tx.send(exit).await {
        tracing::debug!(%agent_id, error = %e, "exit notification dropped");
    }
}

/// Drain stderr so the child cannot block on a full pipe.
pub(crate) fn drain_stderr<R>(agent_id: AgentId, stderr: R)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(%agent_id, "stderr: {line}");
        }
    });
}

/// A locally spawned AI CLI subprocess.
pub struct LocalSession {
    agent_id: AgentId,
    pid: u32,
    child: Arc<tokio::sync::Mutex<Option<Child>>>,
    finished: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    resume_token: Arc<Mutex<Option<String>>>,
}

impl LocalSession {
    /// Spawn the AI CLI for this agent and start the output pipeline.
    ///
    /// Skip-permissions sessions append an audit line before the process
    /// starts.
    pub async fn spawn(
        spec: SessionSpec,
        prompt: &str,
        resume_token: Option<&str>,
        store: Arc<StateStore>,
        meter: Arc<TokenMeter>,
        audit: &AuditLog,
        exit_tx: mpsc::Sender<SessionExit>,
    ) -> Result<Self, SessionError> {
        let bus_config = write_bus_config(&spec.state_dir, spec.agent_id.as_str(), spec.mcp_port, false)
            .map_err(SessionError::ConfigWrite)?;

        if spec.skip_permissions {
            audit.append(AuditEvent::SkipPermissions, spec.agent_id.as_str(), &spec.role, "user");
        }

        let args = build_cli_args(
            &spec.model,
            &bus_config.display().to_string(),
            spec.skip_permissions,
            resume_token,
            prompt,
        );

        tracing::info!(agent_id = %spec.agent_id, model = %spec.model, "spawning session");

        let mut child = Command::new("claude")
            .args(&args)
            .current_dir(&spec.worktree)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(SessionError::Spawn)?;

        let pid = child.id().unwrap_or_default();
        let stdout = child.stdout.take();
        if let Some(stderr) = child.stderr.take() {
            drain_stderr(spec.agent_id.clone(), stderr);
        }

        meter.register_agent(spec.agent_id.as_str(), &spec.model);
        let patch = AgentPatch {
            status: Some(AgentStatus::Working),
            exec: Some(ExecHandle::Process { pid }),
            ..Default::default()
        };
        if let Err(e) = store.update_agent(spec.agent_id.as_str(), patch) {
            tracing::warn!(agent_id = %spec.agent_id, error = %e, "failed to record process handle");
        }

        let session = Self {
            agent_id: spec.agent_id.clone(),
            pid,
            child: Arc::new(tokio::sync::Mutex::new(Some(child))),
            finished: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            resume_token: Arc::new(Mutex::new(resume_token.map(str::to_string))),
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
                        tracing::warn!(%agent_id, error = %e, "failed to reap session");
                        -1
                    }
                },
                // Someone else already reaped the child (external stop).
                None => 0,
            };
            finish_session(&agent_id, exit_code, &finished, &stop_requested, &sup).await;
        });

        tracing::info!(agent_id = %session.agent_id, pid, "session spawned");
        Ok(session)
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
    }

    pub fn resume_token(&self) -> Option<String> {
        self.resume_token.lock().clone()
    }

    /// Graceful stop: SIGTERM, wait out the grace period, then SIGKILL.
    pub async fn stop(&self, grace: Duration) -> bool {
        if !self.is_running() {
            return true;
        }

        self.stop_requested.store(true, Ordering::SeqCst);
        tracing::info!(agent_id = %self.agent_id, "stopping session");
        if self.pid != 0 {
            unsafe {
                libc::kill(self.pid as i32, libc::SIGTERM);
            }
        }

        if wait_for_flag(&self.finished, grace).await {
            return true;
        }

        tracing::warn!(agent_id = %self.agent_id, "session did not terminate gracefully, killing");
        if let Some(child) = self.child.lock().await.as_mut() {
            if let Err(e) = child.start_kill() {
                tracing::warn!(agent_id = %self.agent_id, error = %e, "failed to kill session");
            }
        }

        wait_for_flag(&self.finished, Duration::from_secs(5)).await
    }
}

/// Poll a completion flag until set or the deadline passes.
pub(crate) async fn wait_for_flag(flag: &AtomicBool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if flag.load(Ordering::SeqCst) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    flag.load(Ordering::SeqCst)
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
