// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level lifecycle: startup gates, bus wiring, spawn admission,
//! lead supervision with a one-restart policy, budget enforcement, and
//! graceful shutdown under signals.

use crate::brief::BriefFile;
use crate::dashboard::DashboardHandle;
use crate::gates;
use arch_adapters::docker::{self, ContainerSpec};
use arch_adapters::{ClaudeMdContext, ContainerCleanup, WorktreeError, WorktreeManager};
use arch_bus::{
    bind, serve_on, BriefSection, BusContext, EscalationRegistry, GithubState, LifecycleHooks,
    PrRequest, SpawnOutcome, SpawnRequest, ToolError,
};
use arch_config::{AgentPoolEntry, ApprovalGate, ArchConfig, ConfigError, NetworkMode};
use arch_core::{utc_now, AgentId, AgentRecord, AgentStatus, HARNESS, LEAD_AGENT};
use arch_engine::{
    ContainerSession, LocalSession, PricingTable, SessionError, SessionExit, SessionManager,
    SessionSpec, TokenMeter,
};
use arch_storage::{AgentPatch, AuditEvent, AuditLog, StateStore, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

/// Grace period per session during shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
/// Grace period when the lead tears one agent down.
const TEARDOWN_GRACE: Duration = Duration::from_secs(30);

/// Callback deciding the skip-permissions startup gate. The production
/// path prompts on the terminal (offloaded to the blocking pool); test
/// hosts inject an answer.
pub type AssentFn = Box<dyn FnOnce(&[String]) -> std::io::Result<bool> + Send>;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub config_path: PathBuf,
    pub keep_worktrees: bool,
    /// Resume the lead's previous conversation if a token is on record.
    pub resume: bool,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("git repository unusable: {0}")]
    Git(String),

    #[error("skip-permissions declined at startup")]
    PermissionDeclined,

    #[error("container runtime unavailable: {0}")]
    Container(String),

    #[error("failed to start bus server: {0}")]
    Bus(std::io::Error),

    #[error(transparent)]
    Worktree(#[from] WorktreeError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("startup I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The running harness.
pub struct Orchestrator {
    inner: Arc<Inner>,
    exit_rx: mpsc::Receiver<SessionExit>,
    bus_shutdown: CancellationToken,
    bus_addr: SocketAddr,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("bus_addr", &self.bus_addr)
            .finish_non_exhaustive()
    }
}

pub(crate) struct Inner {
    config: ArchConfig,
    repo_root: PathBuf,
    state_dir: PathBuf,
    store: Arc<StateStore>,
    meter: Arc<TokenMeter>,
    worktrees: WorktreeManager,
    sessions: SessionManager,
    audit: AuditLog,
    escalations: EscalationRegistry,
    cleanup: ContainerCleanup,
    brief: BriefFile,
    /// Actual bound bus port (the configured one, or OS-assigned when
    /// the config says 0).
    bus_port: AtomicU16,
    github_enabled: bool,
    keep_worktrees: bool,
    exit_tx: mpsc::Sender<SessionExit>,
    /// Per-role instance counters; monotone so ids are never reused.
    admission: Mutex<HashMap<String, u32>>,
    approved_skip_roles: Vec<String>,
    shutdown_requested: AtomicBool,
    shutdown_notify: Notify,
    shutdown_done: AtomicBool,
    budget_decision: Mutex<Option<String>>,
}

impl Orchestrator {
    /// Full startup with the interactive terminal gate.
    pub async fn start(options: OrchestratorOptions) -> Result<Self, StartupError> {
        Self::start_with_gate(
            options,
            Box::new(|roles| {
                let roles: Vec<&str> = roles.iter().map(String::as_str).collect();
                gates::confirm_skip_permissions(
                    &roles,
                    std::io::stdin().lock(),
                    std::io::stdout().lock(),
                )
            }),
        )
        .await
    }

    /// Startup with an injected permission-gate decision (for test
    /// hosts and non-interactive callers).
    pub async fn start_with_gate(
        options: OrchestratorOptions,
        assent: AssentFn,
    ) -> Result<Self, StartupError> {
        tracing::info!("step 1: parsing configuration");
        let config = ArchConfig::load(&options.config_path)?;
        let repo_root = config
            .project
            .repo
            .canonicalize()
            .map_err(|e| StartupError::Git(format!("{}: {e}", config.project.repo.display())))?;

        tracing::info!(project = %config.project.name, "step 2: opening state store");
        let state_dir = if config.settings.state_dir.is_absolute() {
            config.settings.state_dir.clone()
        } else {
            repo_root.join(&config.settings.state_dir)
        };
        std::fs::create_dir_all(&state_dir)?;
        let store = Arc::new(StateStore::open(&state_dir)?);
        store.init_project(&config.project.name, &config.project.description, &repo_root);
        let pricing = PricingTable::load(&repo_root.join("pricing.yaml"));
        let meter = Arc::new(TokenMeter::new(Some(state_dir.clone()), pricing));
        let audit = AuditLog::new(&state_dir);

        tracing::info!("step 3: verifying git repository");
        let worktrees = WorktreeManager::new(&repo_root);
        worktrees.verify_repo().await.map_err(|e| StartupError::Git(e.to_string()))?;

        tracing::info!("step 4: permission gate");
        let skip_roles: Vec<String> =
            config.roles_with_skip_permissions().iter().map(|r| r.to_string()).collect();
        if !skip_roles.is_empty() {
            let gate_roles = skip_roles.clone();
            let approved = tokio::task::spawn_blocking(move || assent(&gate_roles))
                .await
                .map_err(|e| StartupError::Io(std::io::Error::other(e)))??;
            if !approved {
                tracing::info!("user declined skip-permissions, aborting");
                return Err(StartupError::PermissionDeclined);
            }
            for role in &skip_roles {
                audit.append(AuditEvent::StartupApproval, role, role, "user");
            }
        }

        tracing::info!("step 5: container gate");
        gates::container_gate(&config).await.map_err(StartupError::Container)?;

        tracing::info!("step 6: hosting provider gate");
        let github = match gates::github_gate(&config).await {
            Ok(Some(client)) => GithubState::Ready(client),
            Ok(None) => GithubState::Disabled,
            Err(reason) => {
                tracing::warn!(reason, "hosting provider disabled for this session");
                GithubState::Unavailable(reason)
            }
        };
        let github_enabled = matches!(github, GithubState::Ready(_));

        let (exit_tx, exit_rx) = mpsc::channel(32);
        let inner = Arc::new(Inner {
            brief: BriefFile::new(&repo_root),
            worktrees,
            sessions: SessionManager::new(),
            audit,
            escalations: EscalationRegistry::new(),
            cleanup: ContainerCleanup::new(),
            bus_port: AtomicU16::new(0),
            github_enabled,
            keep_worktrees: options.keep_worktrees,
            exit_tx,
            admission: Mutex::new(seed_instance_counters(&store)),
            approved_skip_roles: skip_roles,
            shutdown_requested: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
            shutdown_done: AtomicBool::new(false),
            budget_decision: Mutex::new(None),
            store: Arc::clone(&store),
            meter,
            state_dir,
            repo_root,
            config,
        });

        tracing::info!("step 7: starting bus server");
        let default_branch = inner
            .config
            .github
            .as_ref()
            .map(|g| g.default_branch.clone())
            .unwrap_or_else(|| "main".to_string());
        let ctx = Arc::new(BusContext {
            store: Arc::clone(&store),
            escalations: inner.escalations.clone(),
            hooks: Arc::clone(&inner) as Arc<dyn LifecycleHooks>,
            github,
            default_branch,
        });
        let handle = bind(ctx, inner.config.settings.mcp_port).await.map_err(StartupError::Bus)?;
        let bus_addr = handle.addr;
        inner.bus_port.store(bus_addr.port(), Ordering::SeqCst);
        let bus_shutdown = CancellationToken::new();
        let bus_token = bus_shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_on(handle, bus_token).await {
                tracing::error!(error = %e, "bus server exited with error");
            }
        });

        tracing::info!("step 8: preparing the lead agent");
        inner.prepare_lead().await?;

        tracing::info!("step 9: spawning the lead");
        inner.spawn_lead(options.resume).await?;

        tracing::info!("startup complete");
        Ok(Self { inner, exit_rx, bus_shutdown, bus_addr })
    }

    pub fn bus_addr(&self) -> SocketAddr {
        self.bus_addr
    }

    pub fn dashboard(&self) -> DashboardHandle {
        DashboardHandle::new(
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.meter),
            self.inner.escalations.clone(),
        )
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<Inner> {
        &self.inner
    }

    /// Supervision loop: runs until shutdown, then tears down. Returns
    /// the process exit code.
    pub async fn run(&mut self) -> i32 {
        let mut exit_code = 0;
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sig) => sig,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    self.shutdown().await;
                    return 1;
                }
            };
        let mut budget_tick = tokio::time::interval(Duration::from_secs(1));
        let mut lead_restarted = false;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received SIGINT, initiating shutdown");
                    break;
                }
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM, initiating shutdown");
                    break;
                }
                _ = self.inner.shutdown_notify.notified() => break,
                exit = self.exit_rx.recv() => {
                    let Some(exit) = exit else { break };
                    if !exit.agent_id.is_lead()
                        || self.inner.shutdown_requested.load(Ordering::SeqCst)
                    {
                        continue;
                    }
                    if exit.exit_code == 0 {
                        tracing::info!("lead finished, closing project");
                        break;
                    }
                    if lead_restarted {
                        tracing::error!("lead failed twice, shutting down");
                        exit_code = 1;
                        break;
                    }
                    lead_restarted = true;
                    tracing::warn!(
                        code = exit.exit_code,
                        "lead exited unexpectedly, attempting restart"
                    );
                    if let Err(e) = self.inner.restart_lead().await {
                        tracing::error!(error = %e, "failed to restart lead");
                        exit_code = 1;
                        break;
                    }
                }
                _ = budget_tick.tick() => {
                    if self.inner.check_budget() {
                        tracing::warn!("budget decision answered with shutdown");
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
        exit_code
    }

    /// Graceful teardown; runs at most once, from whichever path fires
    /// first.
    pub async fn shutdown(&self) {
        if self.inner.shutdown_done.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown_requested.store(true, Ordering::SeqCst);
        tracing::info!("shutting down");

        // Unblock every parked escalation with the shutdown sentinel.
        for decision in self.inner.store.pending_decisions() {
            self.inner.store.answer_decision(decision.id.as_str(), "shutdown");
        }
        self.inner.escalations.resolve_all_shutdown();

        let stopped = self.inner.sessions.stop_all(SHUTDOWN_GRACE).await;
        tracing::info!(stopped, "sessions stopped");

        self.inner.cleanup.purge().await;

        if !self.inner.keep_worktrees {
            let removed = self.inner.worktrees.cleanup_all(true).await;
            tracing::info!(removed, "worktrees removed");
        }

        self.bus_shutdown.cancel();
        self.inner.print_cost_summary();
        tracing::info!("shutdown complete");
    }
}

impl Inner {
    fn bus_port(&self) -> u16 {
        self.bus_port.load(Ordering::SeqCst)
    }

    /// Create the lead's worktree and CLAUDE.md and register it.
    async fn prepare_lead(&self) -> Result<(), StartupError> {
        if !self.worktrees.exists(LEAD_AGENT) {
            self.worktrees.create(LEAD_AGENT, None).await?;
        }

        let persona_path = self.repo_root.join(&self.config.archie.persona);
        let persona = std::fs::read_to_string(&persona_path).unwrap_or_else(|_| {
            tracing::warn!(path = %persona_path.display(), "lead persona not found, using default");
            "# Archie — Lead Agent\n\nYou are Archie, the lead agent.".to_string()
        });

        let mut tools: Vec<&str> = arch_bus::worker_tool_names().to_vec();
        tools.extend(arch_bus::lead_tool_names());
        if self.github_enabled {
            tools.extend(arch_bus::github_tool_names());
        }

        let roster = self.active_roster(LEAD_AGENT);
        let session_state = self.store.agent(LEAD_AGENT).and_then(|a| a.context);
        let ctx = ClaudeMdContext {
            agent_id: LEAD_AGENT,
            project_name: &self.config.project.name,
            project_description: &self.config.project.description,
            assignment: &format!("Lead the {} project", self.config.project.name),
            active_agents: &roster,
            tools: &tools,
            session_state: session_state.as_ref(),
            persona: &persona,
        };
        self.worktrees.write_claude_md(&ctx)?;

        if self.store.agent(LEAD_AGENT).is_none() {
            let record = AgentRecord::new(
                AgentId::lead(),
                "lead",
                self.worktrees.worktree_path(LEAD_AGENT),
                &self.config.archie.model,
                utc_now(),
            );
            self.store.register_agent(record)?;
        }
        Ok(())
    }

    /// The lead never skips permissions and never runs in a container.
    async fn spawn_lead(&self, resume: bool) -> Result<(), StartupError> {
        let resume_token = if resume {
            self.store.agent(LEAD_AGENT).and_then(|a| a.resume_token)
        } else {
            None
        };

        let spec = SessionSpec {
            agent_id: AgentId::lead(),
            role: "lead".to_string(),
            model: self.config.archie.model.clone(),
            worktree: self.worktrees.worktree_path(LEAD_AGENT),
            skip_permissions: false,
            mcp_port: self.bus_port(),
            state_dir: self.state_dir.clone(),
        };
        let prompt = self.lead_prompt();
        let session = LocalSession::spawn(
            spec,
            &prompt,
            resume_token.as_deref(),
            Arc::clone(&self.store),
            Arc::clone(&self.meter),
            &self.audit,
            self.exit_tx.clone(),
        )
        .await?;
        self.sessions.insert(Arc::new(session));
        tracing::info!("lead is online");
        Ok(())
    }

    async fn restart_lead(&self) -> Result<(), StartupError> {
        let token = self.store.agent(LEAD_AGENT).and_then(|a| a.resume_token);
        if token.is_none() {
            return Err(StartupError::Session(SessionError::Spawn(std::io::Error::other(
                "no resume token on record for the lead",
            ))));
        }
        self.sessions.remove(LEAD_AGENT);
        self.spawn_lead(true).await
    }

    fn lead_prompt(&self) -> String {
        let mut parts = vec![
            format!("You are Archie, leading the {} project.", self.config.project.name),
            format!("\nProject description: {}", self.config.project.description),
            "\nStart by calling get_project_context to understand the current state.".to_string(),
            "Read BRIEF.md to understand the goals and current status.".to_string(),
        ];
        if self.github_enabled {
            parts.push(
                "\nGitHub integration is enabled. Use gh_list_milestones and gh_list_issues \
                 to understand the sprint state."
                    .to_string(),
            );
        }
        parts.push(
            "\nWhen ready, spawn agents from the pool to work on tasks. \
             Coordinate their work and merge completed branches."
                .to_string(),
        );
        parts.join("\n")
    }

    /// (agent_id, role) pairs of live agents, excluding `except`.
    fn active_roster(&self, except: &str) -> Vec<(String, String)> {
        self.store
            .active_agents()
            .into_iter()
            .filter(|a| a.id.as_str() != except)
            .map(|a| (a.id.as_str().to_string(), a.role.clone()))
            .collect()
    }

    /// Budget check from the supervision tick. Returns true when the
    /// human answered the budget decision with shutdown.
    pub(crate) fn check_budget(&self) -> bool {
        let Some(budget) = self.config.settings.token_budget_usd else {
            return false;
        };

        let mut flagged = self.budget_decision.lock();
        match flagged.as_ref() {
            None => {
                if self.meter.total_cost() >= budget {
                    let decision = self.store.queue_decision(
                        &format!(
                            "budget_exceeded: cumulative cost ${:.2} has crossed the \
                             configured budget ${budget:.2}. Continue?",
                            self.meter.total_cost()
                        ),
                        &["continue".to_string(), "shutdown".to_string()],
                    );
                    tracing::warn!(decision_id = %decision.id, "token budget exceeded, decision queued");
                    *flagged = Some(decision.id.as_str().to_string());
                }
                false
            }
            Some(id) => {
                matches!(self.store.decision(id).and_then(|d| d.answer).as_deref(), Some("shutdown"))
            }
        }
    }

    /// Spawns are refused while a budget decision is unanswered.
    fn budget_blocked(&self) -> Option<ToolError> {
        let flagged = self.budget_decision.lock();
        let id = flagged.as_ref()?;
        match self.store.decision(id) {
            Some(d) if !d.is_resolved() => Some(ToolError::CapExceeded(
                "token budget exceeded; awaiting human decision".to_string(),
            )),
            _ => None,
        }
    }

    fn print_cost_summary(&self) {
        let totals = self.meter.all_totals();
        println!();
        println!("{}", "=".repeat(40));
        println!("COST SUMMARY");
        println!("{}", "=".repeat(40));
        let mut ids: Vec<_> = totals.keys().cloned().collect();
        ids.sort();
        for id in &ids {
            println!("{id:<20} ${:.4}", totals[id].cost_usd);
        }
        println!("{}", "-".repeat(40));
        println!("{:<20} ${:.4}", "Total", self.meter.total_cost());
        if let Some(budget) = self.config.settings.token_budget_usd {
            let pct = if budget > 0.0 { self.meter.total_cost() / budget * 100.0 } else { 0.0 };
            println!("{:<20} ${budget:.2} ({pct:.1}% used)", "Budget");
        }
        println!("{}", "=".repeat(40));
    }

    /// Skip-permissions at spawn time: honored only when pre-approved;
    /// otherwise a decision is queued and the answer decides.
    async fn resolve_skip_request(&self, role: &str, requested: bool) -> Result<bool, ToolError> {
        if !requested {
            return Ok(false);
        }
        if self.approved_skip_roles.iter().any(|r| r == role) {
            return Ok(true);
        }

        let decision = self.store.queue_decision(
            &format!(
                "Role '{role}' requests skip-permissions but was not pre-approved at \
                 startup. Allow?"
            ),
            &["y".to_string(), "n".to_string()],
        );
        let rx = self.escalations.register(decision.id.as_str());
        tracing::warn!(role, decision_id = %decision.id, "skip-permissions not pre-approved, awaiting decision");

        let answer = rx.await.unwrap_or_else(|_| "n".to_string());
        let granted = answer == "y" || answer == "yes";
        if !granted {
            tracing::info!(role, answer, "skip-permissions denied, spawning without it");
        }
        Ok(granted)
    }

    /// Slow half of a spawn: worktree, CLAUDE.md, bus config, session.
    async fn build_agent(
        &self,
        agent_id: &AgentId,
        entry: &AgentPoolEntry,
        req: &SpawnRequest,
        skip_permissions: bool,
    ) -> Result<SpawnOutcome, StartupError> {
        let worktree = self.worktrees.create(agent_id.as_str(), None).await?;

        let persona_path = self.repo_root.join(&entry.persona);
        let persona = std::fs::read_to_string(&persona_path).unwrap_or_else(|_| {
            tracing::warn!(path = %persona_path.display(), "persona not found, using role name");
            format!("# {}\n", entry.id)
        });

        let mut assignment = req.assignment.clone();
        if let Some(context) = &req.context {
            assignment.push_str("\n\nAdditional context: ");
            assignment.push_str(context);
        }

        let roster = self.active_roster(agent_id.as_str());
        let session_state = self.store.agent(agent_id.as_str()).and_then(|a| a.context);
        let ctx = ClaudeMdContext {
            agent_id: agent_id.as_str(),
            project_name: &self.config.project.name,
            project_description: &self.config.project.description,
            assignment: &assignment,
            active_agents: &roster,
            tools: arch_bus::worker_tool_names(),
            session_state: session_state.as_ref(),
            persona: &persona,
        };
        self.worktrees.write_claude_md(&ctx)?;

        let spec = SessionSpec {
            agent_id: agent_id.clone(),
            role: entry.id.clone(),
            model: entry.model.clone(),
            worktree: worktree.clone(),
            skip_permissions,
            mcp_port: self.bus_port(),
            state_dir: self.state_dir.clone(),
        };
        let prompt = format!(
            "You are agent {agent_id} on the {} project.\n\nYour assignment: {assignment}\n\n\
             Read CLAUDE.md in your worktree for harness context; use the bus tools to \
             report status and communicate.",
            self.config.project.name
        );

        if entry.sandbox.enabled {
            let container = ContainerSpec {
                agent_id: agent_id.as_str().to_string(),
                image: entry.sandbox.image.clone(),
                worktree: worktree.clone(),
                bus_config: self.state_dir.join(format!("{agent_id}-mcp.json")),
                network: match entry.sandbox.network {
                    NetworkMode::Bridge => docker::Network::Bridge,
                    NetworkMode::None => docker::Network::None,
                    NetworkMode::Host => docker::Network::Host,
                },
                memory_limit: entry.sandbox.memory_limit.clone(),
                cpus: entry.sandbox.cpus,
                extra_mounts: entry.sandbox.extra_mounts.clone(),
                api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            };
            let session = ContainerSession::spawn(
                spec,
                container,
                &prompt,
                None,
                Arc::clone(&self.store),
                Arc::clone(&self.meter),
                &self.audit,
                self.cleanup.clone(),
                self.exit_tx.clone(),
            )
            .await?;
            self.sessions.insert(Arc::new(session));
        } else {
            let session = LocalSession::spawn(
                spec,
                &prompt,
                None,
                Arc::clone(&self.store),
                Arc::clone(&self.meter),
                &self.audit,
                self.exit_tx.clone(),
            )
            .await?;
            self.sessions.insert(Arc::new(session));
        }

        Ok(SpawnOutcome {
            agent_id: agent_id.as_str().to_string(),
            worktree: worktree.display().to_string(),
            sandboxed: entry.sandbox.enabled,
            skip_permissions,
        })
    }
}

#[async_trait::async_trait]
impl LifecycleHooks for Inner {
    async fn spawn_agent(&self, req: SpawnRequest) -> Result<SpawnOutcome, ToolError> {
        if self.shutdown_requested.load(Ordering::SeqCst) {
            return Err(ToolError::Internal("harness is shutting down".to_string()));
        }
        let entry = self
            .config
            .pool_entry(&req.role)
            .cloned()
            .ok_or_else(|| ToolError::UnknownRole(req.role.clone()))?;
        if let Some(blocked) = self.budget_blocked() {
            return Err(blocked);
        }

        let skip_permissions = self.resolve_skip_request(&req.role, req.skip_permissions).await?;

        // Admission: caps checked and the record registered under one
        // lock, so concurrent spawns cannot both pass.
        let agent_id = {
            let mut counters = self.admission.lock();
            let active = self.store.active_agents();
            let role_active = active.iter().filter(|a| a.role == req.role).count() as u32;
            if role_active >= entry.max_instances {
                return Err(ToolError::CapExceeded(format!(
                    "role '{}' is at max_instances ({})",
                    req.role, entry.max_instances
                )));
            }
            if active.len() as u32 >= self.config.settings.max_concurrent_agents {
                return Err(ToolError::CapExceeded(format!(
                    "max_concurrent_agents ({}) reached",
                    self.config.settings.max_concurrent_agents
                )));
            }

            let counter = counters.entry(req.role.clone()).or_insert(0);
            *counter += 1;
            let agent_id = AgentId::pooled(&req.role, *counter);

            let record = AgentRecord::new(
                agent_id.clone(),
                &req.role,
                self.worktrees.worktree_path(agent_id.as_str()),
                &entry.model,
                utc_now(),
            )
            .sandboxed(entry.sandbox.enabled)
            .skip_permissions(skip_permissions);
            self.store.register_agent(record).map_err(|e| ToolError::Internal(e.to_string()))?;
            agent_id
        };

        match self.build_agent(&agent_id, &entry, &req, skip_permissions).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                // Reported to the lead and surfaced to the caller; the
                // errored record keeps the id from being reused.
                let patch = AgentPatch { status: Some(AgentStatus::Error), ..Default::default() };
                let _ = self.store.update_agent(agent_id.as_str(), patch);
                self.store.append_message(
                    HARNESS,
                    LEAD_AGENT,
                    &format!("Failed to spawn {agent_id} ({}): {e}", req.role),
                );
                Err(ToolError::SpawnFailed(e.to_string()))
            }
        }
    }

    async fn teardown_agent(
        &self,
        agent_id: &str,
        _reason: Option<&str>,
    ) -> Result<(), ToolError> {
        if self.store.agent(agent_id).is_none() {
            return Err(ToolError::UnknownAgent(agent_id.to_string()));
        }

        self.sessions.stop(agent_id, TEARDOWN_GRACE).await;
        self.sessions.remove(agent_id);

        if !self.keep_worktrees {
            // Failed worktree removal is fatal to this teardown; the
            // caller decides whether to retry.
            self.worktrees
                .remove(agent_id, true)
                .await
                .map_err(|e| ToolError::Internal(format!("worktree removal failed: {e}")))?;
        }

        let patch = AgentPatch { status: Some(AgentStatus::Done), ..Default::default() };
        self.store.update_agent(agent_id, patch).map_err(|e| ToolError::Internal(e.to_string()))?;
        tracing::info!(agent_id, "agent torn down");
        Ok(())
    }

    async fn request_merge(
        &self,
        agent_id: &str,
        target: &str,
        pr: Option<PrRequest>,
    ) -> Result<serde_json::Value, ToolError> {
        if self.config.settings.require_user_approval.contains(&ApprovalGate::Merge) {
            let decision = self.store.queue_decision(
                &format!("Merge {agent_id} into {target}?"),
                &["y".to_string(), "n".to_string()],
            );
            let rx = self.escalations.register(decision.id.as_str());
            let answer = rx.await.unwrap_or_else(|_| "n".to_string());
            if answer != "y" && answer != "yes" {
                return Err(ToolError::MergeFailed(format!("declined by user ({answer})")));
            }
        }

        match pr {
            Some(pr) => {
                let created = self
                    .worktrees
                    .create_pull_request(agent_id, target, &pr.title, &pr.body)
                    .await
                    .map_err(|e| ToolError::MergeFailed(e.to_string()))?;
                Ok(serde_json::json!({"pr_number": created.number, "pr_url": created.url}))
            }
            None => {
                self.worktrees
                    .merge(agent_id, target, None)
                    .await
                    .map_err(|e| ToolError::MergeFailed(e.to_string()))?;
                Ok(serde_json::json!({"merged": true, "target": target}))
            }
        }
    }

    async fn close_project(&self, summary: &str) -> Result<(), ToolError> {
        tracing::info!(summary, "close_project received");
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.shutdown_notify.notify_one();
        Ok(())
    }

    async fn project_context(&self) -> Result<serde_json::Value, ToolError> {
        let project = self.store.project();
        let agents: Vec<serde_json::Value> = self
            .store
            .active_agents()
            .into_iter()
            .map(|a| serde_json::json!({"id": a.id, "role": a.role, "status": a.status}))
            .collect();
        let git_status = self.worktrees.repo_status().await;

        Ok(serde_json::json!({
            "name": project.name,
            "description": project.description,
            "repo_path": project.repo,
            "active_agents": agents,
            "git_status": git_status,
            "open_worktrees": self.worktrees.list(),
            "brief": self.brief.read_or_empty(),
        }))
    }

    async fn update_brief(&self, section: BriefSection, content: &str) -> Result<(), ToolError> {
        let result = match section {
            BriefSection::CurrentStatus => self.brief.update_current_status(content),
            BriefSection::DecisionsLog => {
                let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
                self.brief.append_decision(&today, content)
            }
        };
        result.map_err(|e| ToolError::Internal(e.to_string()))
    }
}

/// Recover per-role instance counters from a prior run's records so a
/// restarted harness never hands out an id that was already used.
fn seed_instance_counters(store: &StateStore) -> HashMap<String, u32> {
    let mut counters: HashMap<String, u32> = HashMap::new();
    for agent in store.agents() {
        let id = agent.id.as_str();
        let Some(suffix) = id.strip_prefix(&format!("{}-", agent.role)) else {
            continue;
        };
        if let Ok(n) = suffix.parse::<u32>() {
            let counter = counters.entry(agent.role.clone()).or_insert(0);
            *counter = (*counter).max(n);
        }
    }
    counters
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
