// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent git worktrees.
//!
//! Each agent operates in an isolated worktree at
//! `{repo}/.worktrees/{agent_id}` on branch `agent/{agent_id}`, so agents
//! develop in parallel without touching each other's checkouts. This
//! module owns everything under the worktrees root; no other component
//! mutates those paths.

use crate::subprocess::{self, run_with_timeout, SubprocessError};
use arch_core::SessionContext;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

const WORKTREE_DIR: &str = ".worktrees";
const BRANCH_PREFIX: &str = "agent";

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("worktree already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("worktree does not exist for agent: {0}")]
    Missing(String),

    #[error(transparent)]
    Subprocess(#[from] SubprocessError),

    #[error("could not parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("worktree I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorktreeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Subprocess(e) if e.is_timeout())
    }
}

/// Ahead/behind counts of an agent branch relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchStatus {
    pub ahead: u32,
    pub behind: u32,
    pub has_uncommitted: bool,
}

/// A created pull request, parsed from the hosting provider's JSON output.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
}

/// Context injected into an agent's CLAUDE.md ahead of its persona.
pub struct ClaudeMdContext<'a> {
    pub agent_id: &'a str,
    pub project_name: &'a str,
    pub project_description: &'a str,
    pub assignment: &'a str,
    /// (agent_id, role) pairs for the other live agents.
    pub active_agents: &'a [(String, String)],
    pub tools: &'a [&'a str],
    pub session_state: Option<&'a SessionContext>,
    pub persona: &'a str,
}

/// Manages git worktrees under `{repo}/.worktrees/`.
#[derive(Debug, Clone)]
pub struct WorktreeManager {
    repo_root: PathBuf,
}

impl WorktreeManager {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self { repo_root: repo_root.into() }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn worktree_path(&self, agent_id: &str) -> PathBuf {
        self.repo_root.join(WORKTREE_DIR).join(agent_id)
    }

    pub fn branch_name(&self, agent_id: &str) -> String {
        format!("{BRANCH_PREFIX}/{agent_id}")
    }

    /// Whether a worktree exists for the agent (checked via its `.git`
    /// link file, not just the directory).
    pub fn exists(&self, agent_id: &str) -> bool {
        self.worktree_path(agent_id).join(".git").exists()
    }

    /// Verify the repository root is a usable git checkout.
    pub async fn verify_repo(&self) -> Result<(), WorktreeError> {
        let mut cmd = Command::new("git");
        cmd.args(["rev-parse", "--git-dir"]).current_dir(&self.repo_root);
        run_with_timeout(cmd, subprocess::GIT_TIMEOUT, "git rev-parse").await?;
        Ok(())
    }

    /// Create a worktree for an agent on a fresh `agent/{agent_id}` branch.
    pub async fn create(
        &self,
        agent_id: &str,
        base_branch: Option<&str>,
    ) -> Result<PathBuf, WorktreeError> {
        let path = self.worktree_path(agent_id);
        if path.exists() {
            return Err(WorktreeError::AlreadyExists(path));
        }
        std::fs::create_dir_all(self.repo_root.join(WORKTREE_DIR))?;

        let branch = self.branch_name(agent_id);
        let mut cmd = Command::new("git");
        cmd.arg("worktree")
            .arg("add")
            .arg(&path)
            .args(["-b", &branch])
            .current_dir(&self.repo_root);
        if let Some(base) = base_branch {
            cmd.arg(base);
        }
        run_with_timeout(cmd, subprocess::GIT_TIMEOUT, "git worktree add").await?;

        tracing::info!(agent_id, path = %path.display(), branch, "worktree created");
        Ok(path)
    }

    /// Remove an agent's worktree. Branch deletion afterwards is
    /// best-effort: a still-unmerged branch is left behind with a log
    /// line, while a failed worktree removal is an error the caller must
    /// handle.
    pub async fn remove(&self, agent_id: &str, force: bool) -> Result<bool, WorktreeError> {
        let path = self.worktree_path(agent_id);
        if !path.exists() {
            return Ok(false);
        }

        let mut cmd = Command::new("git");
        cmd.arg("worktree").arg("remove").arg(&path).current_dir(&self.repo_root);
        if force {
            cmd.arg("--force");
        }
        run_with_timeout(cmd, subprocess::GIT_TIMEOUT, "git worktree remove").await?;

        let branch = self.branch_name(agent_id);
        let mut cmd = Command::new("git");
        cmd.args(["branch", "-D", &branch]).current_dir(&self.repo_root);
        if let Err(e) = run_with_timeout(cmd, subprocess::GIT_TIMEOUT, "git branch delete").await {
            tracing::warn!(agent_id, branch, error = %e, "failed to delete agent branch");
        }

        tracing::info!(agent_id, "worktree removed");
        Ok(true)
    }

    /// Merge an agent's branch into `target` with `--no-ff` so branch
    /// attribution survives in history.
    pub async fn merge(
        &self,
        agent_id: &str,
        target: &str,
        summary: Option<&str>,
    ) -> Result<(), WorktreeError> {
        if !self.exists(agent_id) {
            return Err(WorktreeError::Missing(agent_id.to_string()));
        }
        let branch = self.branch_name(agent_id);

        let mut cmd = Command::new("git");
        cmd.args(["checkout", target]).current_dir(&self.repo_root);
        run_with_timeout(cmd, subprocess::GIT_TIMEOUT, "git checkout").await?;

        let mut message = format!("Merge {agent_id}");
        if let Some(summary) = summary {
            message.push_str(": ");
            message.push_str(summary);
        }
        let mut cmd = Command::new("git");
        cmd.args(["merge", "--no-ff", &branch, "-m", &message]).current_dir(&self.repo_root);
        run_with_timeout(cmd, subprocess::GIT_TIMEOUT, "git merge").await?;

        tracing::info!(agent_id, target, "branch merged");
        Ok(())
    }

    /// Push the agent branch and open a pull request against `target`.
    ///
    /// The PR number and URL are read from the provider CLI's JSON
    /// output, never from free text.
    pub async fn create_pull_request(
        &self,
        agent_id: &str,
        target: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, WorktreeError> {
        if !self.exists(agent_id) {
            return Err(WorktreeError::Missing(agent_id.to_string()));
        }
        let branch = self.branch_name(agent_id);

        let mut cmd = Command::new("git");
        cmd.args(["push", "-u", "origin", &branch]).current_dir(&self.repo_root);
        run_with_timeout(cmd, subprocess::GIT_TIMEOUT, "git push").await?;

        let mut cmd = Command::new("gh");
        cmd.args(["pr", "create", "--title", title, "--body", body])
            .args(["--head", &branch, "--base", target])
            .current_dir(&self.repo_root);
        run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh pr create").await?;

        let mut cmd = Command::new("gh");
        cmd.args(["pr", "view", &branch, "--json", "number,url"]).current_dir(&self.repo_root);
        let output = run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh pr view").await?;

        let pr: PullRequest =
            serde_json::from_slice(&output.stdout).map_err(|e| WorktreeError::Parse {
                what: "gh pr view output",
                reason: e.to_string(),
            })?;

        tracing::info!(agent_id, number = pr.number, "pull request created");
        Ok(pr)
    }

    /// Ahead/behind counts for the agent branch plus a dirty-tree flag.
    pub async fn branch_status(
        &self,
        agent_id: &str,
        target: &str,
    ) -> Result<BranchStatus, WorktreeError> {
        if !self.exists(agent_id) {
            return Err(WorktreeError::Missing(agent_id.to_string()));
        }
        let branch = self.branch_name(agent_id);
        let path = self.worktree_path(agent_id);

        let mut cmd = Command::new("git");
        cmd.args(["status", "--porcelain"]).current_dir(&path);
        let status = run_with_timeout(cmd, subprocess::GIT_TIMEOUT, "git status").await?;
        let has_uncommitted = !status.stdout.is_empty();

        let range = format!("{target}...{branch}");
        let mut cmd = Command::new("git");
        cmd.args(["rev-list", "--left-right", "--count", &range]).current_dir(&self.repo_root);
        let output = run_with_timeout(cmd, subprocess::GIT_TIMEOUT, "git rev-list").await?;

        let text = String::from_utf8_lossy(&output.stdout);
        let mut parts = text.split_whitespace();
        let behind = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let ahead = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);

        Ok(BranchStatus { ahead, behind, has_uncommitted })
    }

    /// Short `git status` of the main repository, for project context.
    pub async fn repo_status(&self) -> String {
        let mut cmd = Command::new("git");
        cmd.args(["status", "--short"]).current_dir(&self.repo_root);
        match run_with_timeout(cmd, subprocess::GIT_TIMEOUT, "git status").await {
            Ok(output) => String::from_utf8_lossy(&output.stdout).to_string(),
            Err(_) => "(git status unavailable)".to_string(),
        }
    }

    /// Agent ids with a live worktree on disk.
    pub fn list(&self) -> Vec<String> {
        let base = self.repo_root.join(WORKTREE_DIR);
        let Ok(entries) = std::fs::read_dir(&base) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().join(".git").exists())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        ids.sort();
        ids
    }

    /// Remove every agent worktree, continuing past individual failures.
    /// Returns the number removed.
    pub async fn cleanup_all(&self, force: bool) -> usize {
        let mut removed = 0;
        for agent_id in self.list() {
            match self.remove(&agent_id, force).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(agent_id, error = %e, "failed to remove worktree during cleanup")
                }
            }
        }
        removed
    }

    /// Write CLAUDE.md into an agent's worktree: harness context header,
    /// optional session-state section, then the persona verbatim.
    pub fn write_claude_md(&self, ctx: &ClaudeMdContext<'_>) -> Result<PathBuf, WorktreeError> {
        let path = self.worktree_path(ctx.agent_id);
        if !path.exists() {
            return Err(WorktreeError::Missing(ctx.agent_id.to_string()));
        }

        let agents = if ctx.active_agents.is_empty() {
            "(none yet)".to_string()
        } else {
            ctx.active_agents
                .iter()
                .map(|(id, role)| format!("{id}: {role}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let tools = ctx.tools.join(", ");

        let mut contents = format!(
            "<!-- INJECTED BY ARCH — DO NOT EDIT BELOW THIS LINE -->\n\
             ## ARCH Harness Context\n\
             - **Your agent ID:** {id}\n\
             - **Project:** {name} — {description}\n\
             - **Your worktree path:** {path}\n\
             - **Available MCP tools (via \"arch\" server):** {tools}\n\
             - **Active team members:** {agents}\n\
             - **Your assignment:** {assignment}\n\
             <!-- END ARCH CONTEXT -->\n",
            id = ctx.agent_id,
            name = ctx.project_name,
            description = ctx.project_description,
            path = path.display(),
            tools = tools,
            agents = agents,
            assignment = ctx.assignment,
        );

        if let Some(state) = ctx.session_state {
            contents.push_str("\n## Session State (from previous session)\n");
            if !state.progress.is_empty() {
                contents.push_str(&format!("- **Progress:** {}\n", state.progress));
            }
            if !state.files_modified.is_empty() {
                contents.push_str(&format!(
                    "- **Files modified:** {}\n",
                    state.files_modified.join(", ")
                ));
            }
            if !state.next_steps.is_empty() {
                contents.push_str(&format!("- **Next steps:** {}\n", state.next_steps));
            }
            if let Some(blockers) = &state.blockers {
                contents.push_str(&format!("- **Blockers:** {blockers}\n"));
            }
            if !state.decisions.is_empty() {
                contents.push_str(&format!("- **Decisions:** {}\n", state.decisions.join("; ")));
            }
        }

        contents.push_str("\n---\n\n");
        contents.push_str(ctx.persona);

        let claude_md = path.join("CLAUDE.md");
        std::fs::write(&claude_md, contents)?;
        Ok(claude_md)
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
