// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin wrapper over the GitHub CLI for issue and milestone tools.
//!
//! Availability is checked once at startup (warn-only); tool calls map
//! CLI failures into typed errors so the bus can distinguish
//! provider-disabled, provider-unavailable, and provider-call-failed.

use crate::subprocess::{self, run_with_timeout, SubprocessError};
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("gh CLI not installed")]
    CliMissing,

    #[error("gh not authenticated: {0}")]
    Unauthenticated(String),

    #[error("cannot access repo {repo}: {reason}")]
    RepoInaccessible { repo: String, reason: String },

    #[error("gh call failed: {0}")]
    Call(String),

    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
}

/// An issue row parsed from `gh issue list --json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
    pub state: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueLabel {
    pub name: String,
}

/// A milestone parsed from the repos API.
#[derive(Debug, Clone, Deserialize)]
pub struct Milestone {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub open_issues: u64,
    #[serde(default)]
    pub closed_issues: u64,
    #[serde(default)]
    pub due_on: Option<String>,
    #[serde(default)]
    pub html_url: String,
}

/// GitHub operations scoped to one `owner/name` repository.
#[derive(Debug, Clone)]
pub struct GithubClient {
    repo: String,
}

impl GithubClient {
    pub fn new(repo: impl Into<String>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Startup gate: CLI installed, authenticated, repo reachable.
    pub async fn check(&self) -> Result<(), GithubError> {
        let mut cmd = Command::new("gh");
        cmd.arg("--version");
        match run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh --version").await {
            Ok(_) => {}
            Err(SubprocessError::Spawn { .. }) => return Err(GithubError::CliMissing),
            Err(e) => return Err(e.into()),
        }

        let mut cmd = Command::new("gh");
        cmd.args(["auth", "status"]);
        if let Err(e) = run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh auth status").await {
            return Err(GithubError::Unauthenticated(e.to_string()));
        }

        let mut cmd = Command::new("gh");
        cmd.args(["repo", "view", &self.repo]);
        if let Err(e) = run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh repo view").await {
            return Err(GithubError::RepoInaccessible {
                repo: self.repo.clone(),
                reason: e.to_string(),
            });
        }

        Ok(())
    }

    /// Create an issue; the number is parsed from the returned URL.
    pub async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
        milestone: Option<&str>,
        assignee: Option<&str>,
    ) -> Result<(u64, String), GithubError> {
        let mut cmd = Command::new("gh");
        cmd.args(["issue", "create", "--repo", &self.repo, "--title", title, "--body", body]);
        if !labels.is_empty() {
            cmd.args(["--label", &labels.join(",")]);
        }
        if let Some(milestone) = milestone {
            cmd.args(["--milestone", milestone]);
        }
        if let Some(assignee) = assignee {
            cmd.args(["--assignee", assignee]);
        }

        let output = run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh issue create").await?;
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let number = url
            .rsplit('/')
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| GithubError::Call(format!("unexpected issue URL: {url}")))?;
        Ok((number, url))
    }

    pub async fn list_issues(
        &self,
        labels: &[String],
        milestone: Option<&str>,
        state: &str,
        limit: u32,
    ) -> Result<Vec<Issue>, GithubError> {
        let mut cmd = Command::new("gh");
        cmd.args(["issue", "list", "--repo", &self.repo])
            .args(["--json", "number,title,labels,state,url"])
            .args(["--state", state])
            .args(["--limit", &limit.to_string()]);
        for label in labels {
            cmd.args(["--label", label]);
        }
        if let Some(milestone) = milestone {
            cmd.args(["--milestone", milestone]);
        }

        let output = run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh issue list").await?;
        serde_json::from_slice(&output.stdout)
            .map_err(|e| GithubError::Call(format!("invalid issue list JSON: {e}")))
    }

    pub async fn close_issue(&self, number: u64, comment: Option<&str>) -> Result<(), GithubError> {
        let mut cmd = Command::new("gh");
        cmd.args(["issue", "close", &number.to_string(), "--repo", &self.repo]);
        if let Some(comment) = comment {
            cmd.args(["--comment", comment]);
        }
        run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh issue close").await?;
        Ok(())
    }

    pub async fn update_issue(
        &self,
        number: u64,
        add_labels: &[String],
        remove_labels: &[String],
        milestone: Option<&str>,
        assignee: Option<&str>,
    ) -> Result<(), GithubError> {
        let mut cmd = Command::new("gh");
        cmd.args(["issue", "edit", &number.to_string(), "--repo", &self.repo]);
        if !add_labels.is_empty() {
            cmd.args(["--add-label", &add_labels.join(",")]);
        }
        if !remove_labels.is_empty() {
            cmd.args(["--remove-label", &remove_labels.join(",")]);
        }
        if let Some(milestone) = milestone {
            cmd.args(["--milestone", milestone]);
        }
        if let Some(assignee) = assignee {
            cmd.args(["--add-assignee", assignee]);
        }
        run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh issue edit").await?;
        Ok(())
    }

    pub async fn add_comment(&self, number: u64, body: &str) -> Result<(), GithubError> {
        let mut cmd = Command::new("gh");
        cmd.args(["issue", "comment", &number.to_string(), "--repo", &self.repo, "--body", body]);
        run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh issue comment").await?;
        Ok(())
    }

    /// Create a milestone via the repos API (no direct gh subcommand).
    pub async fn create_milestone(
        &self,
        title: &str,
        description: Option<&str>,
        due_date: Option<&str>,
    ) -> Result<Milestone, GithubError> {
        let mut cmd = Command::new("gh");
        cmd.args(["api", &format!("repos/{}/milestones", self.repo), "-X", "POST"])
            .args(["-f", &format!("title={title}")]);
        if let Some(description) = description {
            cmd.args(["-f", &format!("description={description}")]);
        }
        if let Some(due) = due_date {
            cmd.args(["-f", &format!("due_on={due}T00:00:00Z")]);
        }

        let output = run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh api milestones").await?;
        serde_json::from_slice(&output.stdout)
            .map_err(|e| GithubError::Call(format!("invalid milestone JSON: {e}")))
    }

    pub async fn list_milestones(&self) -> Result<Vec<Milestone>, GithubError> {
        let mut cmd = Command::new("gh");
        cmd.args(["api", &format!("repos/{}/milestones", self.repo)]);
        let output = run_with_timeout(cmd, subprocess::GH_TIMEOUT, "gh api milestones").await?;
        serde_json::from_slice(&output.stdout)
            .map_err(|e| GithubError::Call(format!("invalid milestone list JSON: {e}")))
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
