// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent record: the per-agent entry in the state store.

use crate::id::AgentId;
use crate::status::AgentStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How an agent process is executed.
///
/// Exactly one handle exists per running agent: a local process id or a
/// container name, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecHandle {
    Process { pid: u32 },
    Container { name: String },
}

/// Running token totals for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub turns: u32,
    pub cost_usd: f64,
}

impl UsageTotals {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input_tokens: 0,
            output_tokens: 0,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
            turns: 0,
            cost_usd: 0.0,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Structured session state persisted by the `save_progress` tool and
/// injected into the agent's CLAUDE.md at the next write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub files_modified: Vec<String>,
    pub progress: String,
    pub next_steps: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockers: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<String>,
}

/// One agent's entry in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub role: String,
    pub status: AgentStatus,
    /// Free-text description of what the agent is currently doing.
    #[serde(default)]
    pub task: String,
    /// Opaque token from the AI CLI's result event, used to resume the
    /// conversation in a later session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<String>,
    pub worktree: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecHandle>,
    pub sandboxed: bool,
    pub skip_permissions: bool,
    pub spawned_at: String,
    pub usage: UsageTotals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<SessionContext>,
}

impl AgentRecord {
    /// Fresh record for a newly admitted agent, before its process starts.
    pub fn new(
        id: AgentId,
        role: impl Into<String>,
        worktree: PathBuf,
        model: impl Into<String>,
        spawned_at: String,
    ) -> Self {
        Self {
            id,
            role: role.into(),
            status: AgentStatus::Idle,
            task: String::new(),
            resume_token: None,
            worktree,
            exec: None,
            sandboxed: false,
            skip_permissions: false,
            spawned_at,
            usage: UsageTotals::new(model),
            context: None,
        }
    }

    pub fn sandboxed(mut self, sandboxed: bool) -> Self {
        self.sandboxed = sandboxed;
        self
    }

    pub fn skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    /// Whether this agent counts against concurrency caps.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
