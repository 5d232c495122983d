// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed tool requests and structured tool errors.
//!
//! Every bus call is a tagged request record; the discriminator is the
//! tool name. Authority is decided from the caller's URL-path id in one
//! place (`dispatch`), never per-handler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sections of BRIEF.md the lead may rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefSection {
    /// Full replacement of the Current Status section.
    CurrentStatus,
    /// Append one row to the Decisions Log table.
    DecisionsLog,
}

/// One tool call, decoded from the POST body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolRequest {
    // -- available to every agent --
    SendMessage {
        to: String,
        content: String,
    },
    GetMessages {
        #[serde(default)]
        since: Option<u64>,
    },
    UpdateStatus {
        task: String,
        status: String,
    },
    ReportCompletion {
        summary: String,
        artifacts: Vec<String>,
    },
    SaveProgress {
        files_modified: Vec<String>,
        progress: String,
        next_steps: String,
        #[serde(default)]
        blockers: Option<String>,
        #[serde(default)]
        decisions: Option<Vec<String>>,
    },

    // -- lead only --
    SpawnAgent {
        role: String,
        assignment: String,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        skip_permissions: Option<bool>,
    },
    TeardownAgent {
        agent_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
    ListAgents,
    EscalateToUser {
        question: String,
        #[serde(default)]
        options: Option<Vec<String>>,
    },
    RequestMerge {
        agent_id: String,
        #[serde(default)]
        target_branch: Option<String>,
        #[serde(default)]
        pr_title: Option<String>,
        #[serde(default)]
        pr_body: Option<String>,
    },
    GetProjectContext,
    UpdateBrief {
        section: BriefSection,
        content: String,
    },
    CloseProject {
        summary: String,
    },

    // -- lead only, hosting provider --
    GhCreateIssue {
        title: String,
        body: String,
        #[serde(default)]
        labels: Option<Vec<String>>,
        #[serde(default)]
        milestone: Option<String>,
        #[serde(default)]
        assignee: Option<String>,
    },
    GhListIssues {
        #[serde(default)]
        labels: Option<Vec<String>>,
        #[serde(default)]
        milestone: Option<String>,
        #[serde(default)]
        state: Option<String>,
        #[serde(default)]
        limit: Option<u32>,
    },
    GhCloseIssue {
        issue_number: u64,
        #[serde(default)]
        comment: Option<String>,
    },
    GhUpdateIssue {
        issue_number: u64,
        #[serde(default)]
        add_labels: Option<Vec<String>>,
        #[serde(default)]
        remove_labels: Option<Vec<String>>,
        #[serde(default)]
        milestone: Option<String>,
        #[serde(default)]
        assignee: Option<String>,
    },
    GhAddComment {
        issue_number: u64,
        body: String,
    },
    GhCreateMilestone {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        due_date: Option<String>,
    },
    GhListMilestones,
}

impl ToolRequest {
    /// Whether only the lead agent may call this tool.
    pub fn lead_only(&self) -> bool {
        !matches!(
            self,
            Self::SendMessage { .. }
                | Self::GetMessages { .. }
                | Self::UpdateStatus { .. }
                | Self::ReportCompletion { .. }
                | Self::SaveProgress { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "send_message",
            Self::GetMessages { .. } => "get_messages",
            Self::UpdateStatus { .. } => "update_status",
            Self::ReportCompletion { .. } => "report_completion",
            Self::SaveProgress { .. } => "save_progress",
            Self::SpawnAgent { .. } => "spawn_agent",
            Self::TeardownAgent { .. } => "teardown_agent",
            Self::ListAgents => "list_agents",
            Self::EscalateToUser { .. } => "escalate_to_user",
            Self::RequestMerge { .. } => "request_merge",
            Self::GetProjectContext => "get_project_context",
            Self::UpdateBrief { .. } => "update_brief",
            Self::CloseProject { .. } => "close_project",
            Self::GhCreateIssue { .. } => "gh_create_issue",
            Self::GhListIssues { .. } => "gh_list_issues",
            Self::GhCloseIssue { .. } => "gh_close_issue",
            Self::GhUpdateIssue { .. } => "gh_update_issue",
            Self::GhAddComment { .. } => "gh_add_comment",
            Self::GhCreateMilestone { .. } => "gh_create_milestone",
            Self::GhListMilestones => "gh_list_milestones",
        }
    }
}

/// Tools available to every agent.
pub fn worker_tool_names() -> &'static [&'static str] {
    &["send_message", "get_messages", "update_status", "report_completion", "save_progress"]
}

/// Tools available only to the lead (excluding provider tools).
pub fn lead_tool_names() -> &'static [&'static str] {
    &[
        "spawn_agent",
        "teardown_agent",
        "list_agents",
        "escalate_to_user",
        "request_merge",
        "get_project_context",
        "update_brief",
        "close_project",
    ]
}

/// Hosting-provider tools (lead only, enabled when configured).
pub fn github_tool_names() -> &'static [&'static str] {
    &[
        "gh_create_issue",
        "gh_list_issues",
        "gh_close_issue",
        "gh_update_issue",
        "gh_add_comment",
        "gh_create_milestone",
        "gh_list_milestones",
    ]
}

/// Structured error returned to a calling tool. Never crashes the bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("{0}")]
    InvalidStatus(String),

    #[error("{0}")]
    CapExceeded(String),

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("hosting provider not configured")]
    ProviderDisabled,

    #[error("hosting provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider call failed: {0}")]
    ProviderCallFailed(String),

    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    #[error("merge failed: {0}")]
    MergeFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccessDenied(_) => "access_denied",
            Self::InvalidStatus(_) => "invalid_status",
            Self::CapExceeded(_) => "cap_exceeded",
            Self::UnknownRole(_) => "unknown_role",
            Self::UnknownAgent(_) => "unknown_agent",
            Self::ProviderDisabled => "provider_disabled",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::ProviderCallFailed(_) => "provider_call_failed",
            Self::SpawnFailed(_) => "spawn_failed",
            Self::MergeFailed(_) => "merge_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal",
        }
    }

    /// Wire form: `{"error": {"kind": ..., "message": ...}}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {"kind": self.kind(), "message": self.to_string()}
        })
    }
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
