// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit log for elevated-permission use.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Kinds of audited events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    /// A session was spawned with the CLI's permission prompts bypassed.
    SkipPermissions,
    /// The human approved skip-permissions roles at the startup gate.
    StartupApproval,
}

impl AuditEvent {
    fn as_str(&self) -> &'static str {
        match self {
            Self::SkipPermissions => "SKIP_PERMISSIONS",
            Self::StartupApproval => "STARTUP_APPROVAL",
        }
    }
}

/// Append-only log at `{state_dir}/permissions_audit.log`.
///
/// One line per elevated action: ISO-8601 UTC instant, event kind,
/// agent id, role, approver.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(state_dir: &Path) -> Self {
        Self { path: state_dir.join("permissions_audit.log") }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one audit line. Failures are logged, never fatal: the
    /// elevated action has already been approved through a gate.
    pub fn append(&self, event: AuditEvent, agent_id: &str, role: &str, approved_by: &str) {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let line = format!(
            "{timestamp}  {}  agent_id={agent_id}  role={role}  approved_by={approved_by}\n",
            event.as_str()
        );
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            tracing::error!(path = %self.path.display(), error = %e, "failed to append audit log");
        }
        tracing::warn!(agent_id, role, event = event.as_str(), "elevated permissions recorded");
    }

    /// Read the raw log contents (for `status` and tests).
    pub fn read(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.path)
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
