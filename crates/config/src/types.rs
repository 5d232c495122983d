// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed configuration schema for `arch.yaml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_LEAD_MODEL: &str = "claude-opus-4-5";
pub const DEFAULT_AGENT_MODEL: &str = "claude-sonnet-4-6";
pub const DEFAULT_CONTAINER_IMAGE: &str = "arch-agent:latest";
pub const DEFAULT_LEAD_PERSONA: &str = "personas/archie.md";

/// Complete configuration from `arch.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchConfig {
    pub project: ProjectConfig,
    #[serde(default)]
    pub archie: LeadConfig,
    #[serde(default)]
    pub agent_pool: Vec<AgentPoolEntry>,
    #[serde(default)]
    pub github: Option<GithubConfig>,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_repo")]
    pub repo: PathBuf,
}

fn default_repo() -> PathBuf {
    PathBuf::from(".")
}

/// Lead agent configuration. The lead never runs sandboxed and never
/// skips permissions, so only persona and model are configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadConfig {
    #[serde(default = "default_lead_persona")]
    pub persona: PathBuf,
    #[serde(default = "default_lead_model")]
    pub model: String,
}

impl Default for LeadConfig {
    fn default() -> Self {
        Self { persona: default_lead_persona(), model: default_lead_model() }
    }
}

fn default_lead_persona() -> PathBuf {
    PathBuf::from(DEFAULT_LEAD_PERSONA)
}

fn default_lead_model() -> String {
    DEFAULT_LEAD_MODEL.to_string()
}

/// One role in the agent pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPoolEntry {
    pub id: String,
    pub persona: PathBuf,
    #[serde(default = "default_agent_model")]
    pub model: String,
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

fn default_agent_model() -> String {
    DEFAULT_AGENT_MODEL.to_string()
}

fn default_max_instances() -> u32 {
    1
}

/// Container sandbox settings for a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default)]
    pub extra_mounts: Vec<String>,
    #[serde(default)]
    pub network: NetworkMode,
    #[serde(default)]
    pub memory_limit: Option<String>,
    #[serde(default)]
    pub cpus: Option<f64>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            image: default_image(),
            extra_mounts: Vec::new(),
            network: NetworkMode::default(),
            memory_limit: None,
            cpus: None,
        }
    }
}

fn default_image() -> String {
    DEFAULT_CONTAINER_IMAGE.to_string()
}

/// Container network mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Bridge,
    None,
    Host,
}

/// Permission settings for a role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default)]
    pub skip_permissions: bool,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
}

/// GitHub integration (optional).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Repository in `owner/name` form.
    pub repo: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub labels: Vec<GithubLabel>,
    #[serde(default)]
    pub issue_template: Option<PathBuf>,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubLabel {
    pub name: String,
    #[serde(default = "default_label_color")]
    pub color: String,
}

fn default_label_color() -> String {
    "000000".to_string()
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_agents: u32,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_mcp_port")]
    pub mcp_port: u16,
    #[serde(default)]
    pub token_budget_usd: Option<f64>,
    #[serde(default)]
    pub auto_merge: bool,
    #[serde(default)]
    pub require_user_approval: Vec<ApprovalGate>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrent_agents: default_max_concurrent(),
            state_dir: default_state_dir(),
            mcp_port: default_mcp_port(),
            token_budget_usd: None,
            auto_merge: false,
            require_user_approval: Vec::new(),
        }
    }
}

fn default_max_concurrent() -> u32 {
    5
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./state")
}

fn default_mcp_port() -> u16 {
    3999
}

/// Actions that additionally require human approval at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalGate {
    Merge,
    TeardownAll,
}
