// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Narrow callback handles from the bus into the orchestrator.
//!
//! Sessions and the bus never share a mutable graph with the
//! orchestrator; lifecycle actions flow through this trait and results
//! come back as plain values.

use crate::tools::{BriefSection, ToolError};
use async_trait::async_trait;

/// Parameters of a spawn request, after authority checks.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub role: String,
    pub assignment: String,
    pub context: Option<String>,
    pub skip_permissions: bool,
}

/// What the spawn callback reports back to the calling tool.
#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    pub agent_id: String,
    pub worktree: String,
    pub sandboxed: bool,
    pub skip_permissions: bool,
}

/// A pull-request form of `request_merge`.
#[derive(Debug, Clone)]
pub struct PrRequest {
    pub title: String,
    pub body: String,
}

/// Lifecycle actions owned by the orchestrator, invoked by bus tools.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn spawn_agent(&self, req: SpawnRequest) -> Result<SpawnOutcome, ToolError>;

    async fn teardown_agent(&self, agent_id: &str, reason: Option<&str>)
        -> Result<(), ToolError>;

    /// Local merge when `pr` is absent; pull-request creation otherwise.
    async fn request_merge(
        &self,
        agent_id: &str,
        target: &str,
        pr: Option<PrRequest>,
    ) -> Result<serde_json::Value, ToolError>;

    async fn close_project(&self, summary: &str) -> Result<(), ToolError>;

    /// Project metadata, git status, live-agent summary, brief contents.
    async fn project_context(&self) -> Result<serde_json::Value, ToolError>;

    async fn update_brief(&self, section: BriefSection, content: &str) -> Result<(), ToolError>;
}
