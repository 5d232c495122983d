// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arch_core::SessionContext;

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

fn init_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-b", "main"]);
    std::fs::write(dir.path().join("README.md"), "seed\n").unwrap();
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-m", "seed"]);
    dir
}

#[tokio::test]
async fn create_and_remove_worktree() {
    let repo = init_repo();
    let manager = WorktreeManager::new(repo.path());

    let path = manager.create("qa-1", None).await.unwrap();
    assert!(path.join(".git").exists());
    assert!(manager.exists("qa-1"));
    assert_eq!(manager.list(), vec!["qa-1".to_string()]);

    let removed = manager.remove("qa-1", true).await.unwrap();
    assert!(removed);
    assert!(!manager.exists("qa-1"));
    assert!(manager.list().is_empty());
}

#[tokio::test]
async fn create_twice_is_rejected() {
    let repo = init_repo();
    let manager = WorktreeManager::new(repo.path());

    manager.create("qa-1", None).await.unwrap();
    let err = manager.create("qa-1", None).await.unwrap_err();
    assert!(matches!(err, WorktreeError::AlreadyExists(_)));
}

#[tokio::test]
async fn remove_missing_worktree_is_noop() {
    let repo = init_repo();
    let manager = WorktreeManager::new(repo.path());
    assert!(!manager.remove("ghost", true).await.unwrap());
}

#[tokio::test]
async fn merge_uses_no_ff() {
    let repo = init_repo();
    let manager = WorktreeManager::new(repo.path());

    let wt = manager.create("qa-1", None).await.unwrap();
    std::fs::write(wt.join("feature.txt"), "work\n").unwrap();
    git(&wt, &["add", "."]);
    git(&wt, &["commit", "-m", "agent work"]);

    manager.merge("qa-1", "main", Some("verified")).await.unwrap();

    // --no-ff always produces a merge commit with the attribution message.
    let output = std::process::Command::new("git")
        .args(["log", "-1", "--pretty=%s"])
        .current_dir(repo.path())
        .output()
        .unwrap();
    let subject = String::from_utf8_lossy(&output.stdout);
    assert_eq!(subject.trim(), "Merge qa-1: verified");
}

#[tokio::test]
async fn branch_status_counts_ahead_commits() {
    let repo = init_repo();
    let manager = WorktreeManager::new(repo.path());

    let wt = manager.create("qa-1", None).await.unwrap();
    std::fs::write(wt.join("a.txt"), "a\n").unwrap();
    git(&wt, &["add", "."]);
    git(&wt, &["commit", "-m", "one"]);
    std::fs::write(wt.join("dirty.txt"), "dirty\n").unwrap();

    let status = manager.branch_status("qa-1", "main").await.unwrap();
    assert_eq!(status.ahead, 1);
    assert_eq!(status.behind, 0);
    assert!(status.has_uncommitted);
}

#[tokio::test]
async fn verify_repo_rejects_non_repo() {
    let dir = tempfile::tempdir().unwrap();
    let manager = WorktreeManager::new(dir.path());
    assert!(manager.verify_repo().await.is_err());
}

#[tokio::test]
async fn claude_md_composes_header_state_and_persona() {
    let repo = init_repo();
    let manager = WorktreeManager::new(repo.path());
    manager.create("frontend-1", None).await.unwrap();

    let state = SessionContext {
        files_modified: vec!["src/app.tsx".to_string(), "src/api.ts".to_string()],
        progress: "login page scaffolded".to_string(),
        next_steps: "wire the session API".to_string(),
        blockers: Some("waiting on auth schema".to_string()),
        decisions: vec!["use cookie sessions".to_string()],
    };
    let ctx = ClaudeMdContext {
        agent_id: "frontend-1",
        project_name: "shop",
        project_description: "storefront rewrite",
        assignment: "build the login page",
        active_agents: &[("archie".to_string(), "lead".to_string())],
        tools: &["send_message", "get_messages"],
        session_state: Some(&state),
        persona: "# Frontend Engineer\n\nYou build UIs.",
    };

    let path = manager.write_claude_md(&ctx).unwrap();
    let contents = std::fs::read_to_string(path).unwrap();

    // Header fields
    assert!(contents.contains("**Your agent ID:** frontend-1"));
    assert!(contents.contains("**Project:** shop — storefront rewrite"));
    assert!(contents.contains("**Active team members:** archie: lead"));
    assert!(contents.contains("**Your assignment:** build the login page"));
    assert!(contents.contains("send_message, get_messages"));

    // Session state section between header and persona
    assert!(contents.contains("## Session State (from previous session)"));
    assert!(contents.contains("**Progress:** login page scaffolded"));
    assert!(contents.contains("**Files modified:** src/app.tsx, src/api.ts"));
    assert!(contents.contains("**Blockers:** waiting on auth schema"));
    assert!(contents.contains("**Decisions:** use cookie sessions"));

    // Persona comes last, verbatim.
    assert!(contents.ends_with("# Frontend Engineer\n\nYou build UIs."));
}

#[tokio::test]
async fn claude_md_without_state_omits_section() {
    let repo = init_repo();
    let manager = WorktreeManager::new(repo.path());
    manager.create("qa-1", None).await.unwrap();

    let ctx = ClaudeMdContext {
        agent_id: "qa-1",
        project_name: "shop",
        project_description: "",
        assignment: "verify",
        active_agents: &[],
        tools: &["send_message"],
        session_state: None,
        persona: "persona body",
    };
    let path = manager.write_claude_md(&ctx).unwrap();
    let contents = std::fs::read_to_string(path).unwrap();
    assert!(!contents.contains("## Session State"));
    assert!(contents.contains("(none yet)"));
}

#[tokio::test]
async fn cleanup_all_removes_every_worktree() {
    let repo = init_repo();
    let manager = WorktreeManager::new(repo.path());
    manager.create("a-1", None).await.unwrap();
    manager.create("b-1", None).await.unwrap();

    let removed = manager.cleanup_all(true).await;
    assert_eq!(removed, 2);
    assert!(manager.list().is_empty());
}
