// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only message log entries.

use serde::{Deserialize, Serialize};

/// Message ids are a monotone counter owned by the state store.
pub type MessageId = u64;

/// Recipient sentinel: deliver to every agent.
pub const BROADCAST: &str = "broadcast";
/// Sender sentinel: the human operator (via the dashboard).
pub const USER: &str = "user";
/// Sender sentinel: the harness itself (exit notifications etc).
pub const HARNESS: &str = "harness";

/// One entry in the append-only message log. Never deleted, only
/// marked read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: String,
    pub to: String,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// Whether this message should be delivered to `agent_id`.
    pub fn is_for(&self, agent_id: &str) -> bool {
        self.to == agent_id || self.to == BROADCAST
    }
}
