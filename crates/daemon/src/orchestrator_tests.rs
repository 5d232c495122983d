// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

fn git(repo: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(args)
        .current_dir(repo)
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

/// Temp git repo with personas, a BRIEF, and a stand-in `claude` binary
/// on PATH that just sleeps until stopped.
fn setup_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-b", "main"]);

    std::fs::create_dir_all(dir.path().join("personas")).unwrap();
    std::fs::write(dir.path().join("personas/archie.md"), "# Archie\n\nLead persona.\n").unwrap();
    std::fs::write(dir.path().join("personas/frontend.md"), "# Frontend\n").unwrap();
    std::fs::write(dir.path().join("BRIEF.md"), crate::brief::scaffold("shop")).unwrap();
    std::fs::write(dir.path().join("README.md"), "seed\n").unwrap();
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-m", "seed"]);

    let bin = dir.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let script = bin.join("claude");
    std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    let path = format!("{}:{}", bin.display(), std::env::var("PATH").unwrap_or_default());
    std::env::set_var("PATH", path);

    dir
}

fn write_config(repo: &Path, extra: &str) -> PathBuf {
    let yaml = format!(
        "project:\n  name: shop\n  description: storefront rewrite\n  repo: {repo}\n\
         settings:\n  mcp_port: 0\n{extra}",
        repo = repo.display()
    );
    let path = repo.join("arch.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

fn options(config_path: PathBuf) -> OrchestratorOptions {
    OrchestratorOptions { config_path, keep_worktrees: false, resume: false }
}

const FRONTEND_POOL: &str = "agent_pool:\n  - id: frontend\n    persona: personas/frontend.md\n    max_instances: 1\n";

fn spawn_request(role: &str) -> SpawnRequest {
    SpawnRequest {
        role: role.to_string(),
        assignment: "hello".to_string(),
        context: None,
        skip_permissions: false,
    }
}

#[tokio::test]
#[serial_test::serial]
async fn startup_spawns_lead_and_shutdown_cleans_worktrees() {
    let repo = setup_repo();
    let config = write_config(repo.path(), FRONTEND_POOL);

    let orchestrator = Orchestrator::start(options(config)).await.unwrap();

    let lead = orchestrator.inner().store.agent(LEAD_AGENT).unwrap();
    assert_eq!(lead.role, "lead");
    assert_eq!(lead.status, AgentStatus::Working);
    assert!(matches!(lead.exec, Some(arch_core::ExecHandle::Process { .. })));

    let claude_md = repo.path().join(".worktrees/archie/CLAUDE.md");
    let contents = std::fs::read_to_string(&claude_md).unwrap();
    assert!(contents.contains("**Your agent ID:** archie"));
    assert!(contents.contains("spawn_agent"));
    assert!(contents.contains("Lead persona."));

    // The per-agent bus config points at the bound port.
    let bus_config: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(repo.path().join("state/archie-mcp.json")).unwrap(),
    )
    .unwrap();
    let url = bus_config["mcpServers"]["arch"]["url"].as_str().unwrap();
    assert!(url.ends_with("/sse/archie"));
    assert!(url.contains(&orchestrator.bus_addr().port().to_string()));

    orchestrator.shutdown().await;
    assert!(orchestrator.inner().worktrees.list().is_empty());
    assert!(!repo.path().join(".worktrees/archie").exists());
}

#[tokio::test]
#[serial_test::serial]
async fn concurrent_spawns_respect_the_role_cap() {
    let repo = setup_repo();
    let config = write_config(repo.path(), FRONTEND_POOL);
    let orchestrator = Orchestrator::start(options(config)).await.unwrap();
    let inner = Arc::clone(orchestrator.inner());

    let (a, b) = tokio::join!(
        inner.spawn_agent(spawn_request("frontend")),
        inner.spawn_agent(spawn_request("frontend")),
    );

    let (ok, err) = match (a, b) {
        (Ok(ok), Err(err)) => (ok, err),
        (Err(err), Ok(ok)) => (ok, err),
        other => panic!("expected exactly one success, got {other:?}"),
    };
    assert_eq!(ok.agent_id, "frontend-1");
    assert!(!ok.sandboxed);
    assert_eq!(err.kind(), "cap_exceeded");
    assert!(err.to_string().contains("frontend"));

    orchestrator.shutdown().await;
}

#[tokio::test]
#[serial_test::serial]
async fn global_cap_counts_the_lead() {
    let repo = setup_repo();
    let extra = format!("{FRONTEND_POOL}  - id: qa\n    persona: personas/frontend.md\n");
    let config_path = repo.path().join("arch.yaml");
    std::fs::write(
        &config_path,
        format!(
            "project:\n  name: shop\n  repo: {}\nsettings:\n  mcp_port: 0\n  max_concurrent_agents: 2\n{extra}",
            repo.path().display()
        ),
    )
    .unwrap();
    let orchestrator = Orchestrator::start(options(config_path)).await.unwrap();
    let inner = Arc::clone(orchestrator.inner());

    inner.spawn_agent(spawn_request("frontend")).await.unwrap();
    let err = inner.spawn_agent(spawn_request("qa")).await.unwrap_err();
    assert_eq!(err.kind(), "cap_exceeded");
    assert!(err.to_string().contains("max_concurrent_agents"));

    orchestrator.shutdown().await;
}

#[tokio::test]
#[serial_test::serial]
async fn unknown_role_is_rejected_before_any_side_effect() {
    let repo = setup_repo();
    let config = write_config(repo.path(), FRONTEND_POOL);
    let orchestrator = Orchestrator::start(options(config)).await.unwrap();
    let inner = Arc::clone(orchestrator.inner());

    let err = inner.spawn_agent(spawn_request("backend")).await.unwrap_err();
    assert_eq!(err.kind(), "unknown_role");
    assert!(orchestrator.inner().store.agent("backend-1").is_none());

    orchestrator.shutdown().await;
}

#[tokio::test]
#[serial_test::serial]
async fn teardown_stops_session_and_removes_worktree() {
    let repo = setup_repo();
    let config = write_config(repo.path(), FRONTEND_POOL);
    let orchestrator = Orchestrator::start(options(config)).await.unwrap();
    let inner = Arc::clone(orchestrator.inner());

    inner.spawn_agent(spawn_request("frontend")).await.unwrap();
    assert!(repo.path().join(".worktrees/frontend-1").exists());

    inner.teardown_agent("frontend-1", Some("done")).await.unwrap();

    assert!(!repo.path().join(".worktrees/frontend-1").exists());
    assert_eq!(inner.store.agent("frontend-1").unwrap().status, AgentStatus::Done);
    assert!(inner.sessions.get("frontend-1").is_none());

    let err = inner.teardown_agent("ghost-9", None).await.unwrap_err();
    assert_eq!(err.kind(), "unknown_agent");

    orchestrator.shutdown().await;
}

#[tokio::test]
#[serial_test::serial]
async fn agent_ids_are_never_reused() {
    let repo = setup_repo();
    let config = write_config(repo.path(), FRONTEND_POOL);
    let orchestrator = Orchestrator::start(options(config)).await.unwrap();
    let inner = Arc::clone(orchestrator.inner());

    let first = inner.spawn_agent(spawn_request("frontend")).await.unwrap();
    assert_eq!(first.agent_id, "frontend-1");

    inner.teardown_agent("frontend-1", None).await.unwrap();

    let second = inner.spawn_agent(spawn_request("frontend")).await.unwrap();
    assert_eq!(second.agent_id, "frontend-2");

    orchestrator.shutdown().await;
}

#[tokio::test]
#[serial_test::serial]
async fn declined_permission_gate_aborts_with_no_sessions() {
    let repo = setup_repo();
    let extra = "agent_pool:\n  - id: security\n    persona: personas/frontend.md\n    permissions:\n      skip_permissions: true\n";
    let config = write_config(repo.path(), extra);

    let err = Orchestrator::start_with_gate(options(config), Box::new(|_| Ok(false)))
        .await
        .unwrap_err();
    assert!(matches!(err, StartupError::PermissionDeclined));

    // No sessions spawned, no worktrees created.
    assert!(!repo.path().join(".worktrees").join(LEAD_AGENT).exists());
    let agents_file = repo.path().join("state/agents.json");
    if agents_file.exists() {
        let agents: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(agents_file).unwrap()).unwrap();
        assert!(agents.as_object().unwrap().is_empty());
    }
}

#[tokio::test]
#[serial_test::serial]
async fn approved_permission_gate_is_audited() {
    let repo = setup_repo();
    let extra = "agent_pool:\n  - id: security\n    persona: personas/frontend.md\n    permissions:\n      skip_permissions: true\n";
    let config = write_config(repo.path(), extra);

    let orchestrator =
        Orchestrator::start_with_gate(options(config), Box::new(|roles| {
            assert_eq!(roles, ["security".to_string()]);
            Ok(true)
        }))
        .await
        .unwrap();

    let audit = std::fs::read_to_string(repo.path().join("state/permissions_audit.log")).unwrap();
    assert!(audit.contains("STARTUP_APPROVAL"));
    assert!(audit.contains("role=security"));

    // A spawn honoring the pre-approved skip adds a SKIP_PERMISSIONS line.
    let inner = Arc::clone(orchestrator.inner());
    let outcome = inner
        .spawn_agent(SpawnRequest {
            role: "security".to_string(),
            assignment: "audit the deps".to_string(),
            context: None,
            skip_permissions: true,
        })
        .await
        .unwrap();
    assert!(outcome.skip_permissions);

    let audit = std::fs::read_to_string(repo.path().join("state/permissions_audit.log")).unwrap();
    assert!(audit.contains("SKIP_PERMISSIONS"));
    assert!(audit.contains("agent_id=security-1"));

    orchestrator.shutdown().await;
}

#[tokio::test]
#[serial_test::serial]
async fn budget_crossing_queues_one_decision_and_blocks_spawns() {
    let repo = setup_repo();
    let config_path = repo.path().join("arch.yaml");
    std::fs::write(
        &config_path,
        format!(
            "project:\n  name: shop\n  repo: {}\nsettings:\n  mcp_port: 0\n  token_budget_usd: 1.0\n{FRONTEND_POOL}",
            repo.path().display()
        ),
    )
    .unwrap();
    let orchestrator = Orchestrator::start(options(config_path)).await.unwrap();
    let inner = Arc::clone(orchestrator.inner());

    // Push the lead's cost over the budget.
    inner.meter.observe_line(
        LEAD_AGENT,
        r#"{"type":"usage","input_tokens":1000000,"output_tokens":0,"cache_read_input_tokens":0,"cache_creation_input_tokens":0}"#,
    );

    assert!(!inner.check_budget());
    let pending = inner.store.pending_decisions();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].question.contains("budget_exceeded"));

    // Repeated ticks do not queue duplicates.
    assert!(!inner.check_budget());
    assert_eq!(inner.store.pending_decisions().len(), 1);

    // Spawns are blocked while the decision is unanswered.
    let err = inner.spawn_agent(spawn_request("frontend")).await.unwrap_err();
    assert_eq!(err.kind(), "cap_exceeded");
    assert!(err.to_string().contains("budget"));

    // "continue" unblocks; the loop does not shut down.
    let id = pending[0].id.as_str().to_string();
    inner.store.answer_decision(&id, "continue");
    assert!(!inner.check_budget());
    inner.spawn_agent(spawn_request("frontend")).await.unwrap();

    orchestrator.shutdown().await;
}

#[tokio::test]
#[serial_test::serial]
async fn shutdown_resolves_outstanding_escalations() {
    let repo = setup_repo();
    let config = write_config(repo.path(), FRONTEND_POOL);
    let orchestrator = Orchestrator::start(options(config)).await.unwrap();
    let inner = Arc::clone(orchestrator.inner());

    let decision = inner.store.queue_decision("Merge?", &[]);
    let rx = inner.escalations.register(decision.id.as_str());

    orchestrator.shutdown().await;

    assert_eq!(rx.await.unwrap(), "shutdown");
    let answered = inner.store.decision(decision.id.as_str()).unwrap();
    assert_eq!(answered.answer.as_deref(), Some("shutdown"));
    assert!(inner.store.pending_decisions().is_empty());
}

#[test]
fn instance_counters_recover_from_prior_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    for id in ["frontend-1", "frontend-3", "qa-2"] {
        let role = id.rsplit_once('-').unwrap().0;
        store
            .register_agent(AgentRecord::new(
                AgentId::from(id),
                role,
                dir.path().join(id),
                "claude-sonnet-4-6",
                utc_now(),
            ))
            .unwrap();
    }
    // The lead and malformed ids are skipped.
    store
        .register_agent(AgentRecord::new(
            AgentId::lead(),
            "lead",
            dir.path().join("archie"),
            "claude-opus-4-5",
            utc_now(),
        ))
        .unwrap();

    let counters = seed_instance_counters(&store);
    assert_eq!(counters.get("frontend"), Some(&3));
    assert_eq!(counters.get("qa"), Some(&2));
    assert!(!counters.contains_key("lead"));
}

#[tokio::test]
#[serial_test::serial]
async fn keep_worktrees_preserves_checkouts_on_shutdown() {
    let repo = setup_repo();
    let config = write_config(repo.path(), FRONTEND_POOL);
    let orchestrator = Orchestrator::start(OrchestratorOptions {
        config_path: config,
        keep_worktrees: true,
        resume: false,
    })
    .await
    .unwrap();

    orchestrator.shutdown().await;
    assert!(repo.path().join(".worktrees/archie").exists());
}
