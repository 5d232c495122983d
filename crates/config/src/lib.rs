// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `arch.yaml` parsing and validation.

mod types;

pub use types::{
    AgentPoolEntry, ApprovalGate, ArchConfig, GithubConfig, GithubLabel, LeadConfig, NetworkMode,
    PermissionsConfig, ProjectConfig, SandboxConfig, Settings, DEFAULT_AGENT_MODEL,
    DEFAULT_CONTAINER_IMAGE, DEFAULT_LEAD_MODEL, DEFAULT_LEAD_PERSONA,
};

use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
///
/// All of these are fatal at startup: the process exits non-zero with no
/// side effects.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ArchConfig {
    /// Load and validate `arch.yaml` from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: ArchConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation beyond what serde enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.name.trim().is_empty() {
            return Err(ConfigError::Invalid("project.name is required".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &self.agent_pool {
            if entry.id.trim().is_empty() {
                return Err(ConfigError::Invalid("agent_pool entry missing id".into()));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate agent_pool id '{}'",
                    entry.id
                )));
            }
            if entry.persona.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "agent '{}' must have a persona",
                    entry.id
                )));
            }
            if entry.max_instances == 0 {
                return Err(ConfigError::Invalid(format!(
                    "agent '{}' max_instances must be at least 1",
                    entry.id
                )));
            }
        }

        if let Some(github) = &self.github {
            let mut parts = github.repo.splitn(2, '/');
            let owner = parts.next().unwrap_or("");
            let name = parts.next().unwrap_or("");
            if owner.is_empty() || name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "github.repo must be 'owner/name', got '{}'",
                    github.repo
                )));
            }
        }

        if self.settings.max_concurrent_agents == 0 {
            return Err(ConfigError::Invalid(
                "settings.max_concurrent_agents must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Pool roles that declared skip-permissions in config.
    ///
    /// These require explicit human assent at the startup gate before any
    /// session spawns.
    pub fn roles_with_skip_permissions(&self) -> Vec<&str> {
        self.agent_pool
            .iter()
            .filter(|a| a.permissions.skip_permissions)
            .map(|a| a.id.as_str())
            .collect()
    }

    /// Pool roles that run inside a container.
    pub fn sandboxed_roles(&self) -> Vec<&str> {
        self.agent_pool
            .iter()
            .filter(|a| a.sandbox.enabled)
            .map(|a| a.id.as_str())
            .collect()
    }

    /// Distinct container images required by the pool.
    pub fn required_images(&self) -> Vec<&str> {
        let mut images: Vec<&str> = self
            .agent_pool
            .iter()
            .filter(|a| a.sandbox.enabled)
            .map(|a| a.sandbox.image.as_str())
            .collect();
        images.sort_unstable();
        images.dedup();
        images
    }

    /// Look up a pool entry by role id.
    pub fn pool_entry(&self, role: &str) -> Option<&AgentPoolEntry> {
        self.agent_pool.iter().find(|a| a.id == role)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
