// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::status::AgentStatus;

fn record() -> AgentRecord {
    AgentRecord::new(
        AgentId::pooled("frontend", 1),
        "frontend",
        PathBuf::from("/repo/.worktrees/frontend-1"),
        "claude-sonnet-4-6",
        "2026-08-02T00:00:00Z".to_string(),
    )
}

#[test]
fn new_record_starts_idle_with_zero_usage() {
    let rec = record();
    assert_eq!(rec.status, AgentStatus::Idle);
    assert_eq!(rec.usage.total_tokens(), 0);
    assert_eq!(rec.usage.cost_usd, 0.0);
    assert!(rec.exec.is_none());
    assert!(rec.is_active());
}

#[test]
fn terminal_record_is_not_active() {
    let mut rec = record();
    rec.status = AgentStatus::Done;
    assert!(!rec.is_active());
    rec.status = AgentStatus::Error;
    assert!(!rec.is_active());
}

#[test]
fn exec_handle_serde_roundtrip() {
    let proc = ExecHandle::Process { pid: 4242 };
    let json = serde_json::to_string(&proc).unwrap();
    assert_eq!(serde_json::from_str::<ExecHandle>(&json).unwrap(), proc);

    let ctr = ExecHandle::Container { name: "arch-qa-1".to_string() };
    let json = serde_json::to_string(&ctr).unwrap();
    assert_eq!(serde_json::from_str::<ExecHandle>(&json).unwrap(), ctr);
}

#[test]
fn record_serde_roundtrip() {
    let mut rec = record().sandboxed(true).skip_permissions(true);
    rec.exec = Some(ExecHandle::Container { name: "arch-frontend-1".to_string() });
    rec.context = Some(SessionContext {
        files_modified: vec!["src/app.tsx".to_string()],
        progress: "login page scaffolded".to_string(),
        next_steps: "wire the session API".to_string(),
        blockers: None,
        decisions: vec![],
    });

    let json = serde_json::to_string(&rec).unwrap();
    let parsed: AgentRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, rec);
}

#[test]
fn optional_fields_are_omitted_when_empty() {
    let json = serde_json::to_string(&record()).unwrap();
    assert!(!json.contains("resume_token"));
    assert!(!json.contains("context"));
    assert!(!json.contains("exec"));
}
