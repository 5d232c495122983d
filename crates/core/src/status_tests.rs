// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    idle           = { "idle", AgentStatus::Idle },
    working        = { "working", AgentStatus::Working },
    blocked        = { "blocked", AgentStatus::Blocked },
    waiting_review = { "waiting_review", AgentStatus::WaitingReview },
    done           = { "done", AgentStatus::Done },
    error          = { "error", AgentStatus::Error },
)]
fn agent_status_parses_and_displays(s: &str, status: AgentStatus) {
    assert_eq!(s.parse::<AgentStatus>().unwrap(), status);
    assert_eq!(status.to_string(), s);
}

#[yare::parameterized(
    empty    = { "" },
    unknown  = { "sleeping" },
    spawning = { "spawning" },
    caps     = { "Working" },
)]
fn agent_status_rejects_outside_closed_set(s: &str) {
    assert!(s.parse::<AgentStatus>().is_err());
}

#[test]
fn terminal_statuses() {
    assert!(AgentStatus::Done.is_terminal());
    assert!(AgentStatus::Error.is_terminal());
    assert!(!AgentStatus::Working.is_terminal());
    assert!(!AgentStatus::Blocked.is_terminal());
}

#[test]
fn agent_status_serde_uses_snake_case() {
    let json = serde_json::to_string(&AgentStatus::WaitingReview).unwrap();
    assert_eq!(json, "\"waiting_review\"");
}

#[yare::parameterized(
    pending     = { "pending", TaskStatus::Pending },
    in_progress = { "in_progress", TaskStatus::InProgress },
    done        = { "done", TaskStatus::Done },
)]
fn task_status_parses(s: &str, status: TaskStatus) {
    assert_eq!(s.parse::<TaskStatus>().unwrap(), status);
    assert_eq!(status.to_string(), s);
}
