// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core types shared across the ARCH harness: identifiers, clocks,
//! status enums, and the data records persisted by the state store.

pub mod agent;
pub mod decision;
pub mod id;
pub mod message;
pub mod project;
pub mod status;
pub mod task;

pub use agent::{AgentRecord, ExecHandle, SessionContext, UsageTotals};
pub use decision::{Decision, DecisionId};
pub use id::LEAD_AGENT;
pub use id::AgentId;
pub use message::{Message, MessageId, BROADCAST, HARNESS, USER};
pub use project::ProjectContext;
pub use status::{AgentStatus, InvalidStatusError, TaskStatus};
pub use task::{Task, TaskId};

/// Current UTC time as an ISO 8601 string (second precision, `Z` suffix).
pub fn utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
