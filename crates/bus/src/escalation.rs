// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot completions for blocked `escalate_to_user` calls.
//!
//! A tool call parks on the receiver registered under its decision id;
//! the dashboard (or shutdown) resolves it. Shutdown resolves every
//! outstanding completion with a synthetic answer so no call hangs.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Answer delivered when shutdown resolves an escalation.
pub const SHUTDOWN_ANSWER: &str = "shutdown";

#[derive(Clone, Default)]
pub struct EscalationRegistry {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<String>>>>,
}

impl EscalationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a completion for a decision id; the caller awaits the
    /// returned receiver.
    pub fn register(&self, decision_id: &str) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(decision_id.to_string(), tx);
        rx
    }

    /// Resolve a parked escalation. Returns false when nothing was
    /// waiting under that id (already resolved, or unknown).
    pub fn resolve(&self, decision_id: &str, answer: &str) -> bool {
        match self.pending.lock().remove(decision_id) {
            Some(tx) => tx.send(answer.to_string()).is_ok(),
            None => false,
        }
    }

    /// Drop a registration without answering (caller gave up).
    pub fn discard(&self, decision_id: &str) {
        self.pending.lock().remove(decision_id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Resolve everything with the shutdown sentinel so the reactor
    /// drains cleanly.
    pub fn resolve_all_shutdown(&self) {
        let pending: Vec<_> = {
            let mut map = self.pending.lock();
            map.drain().collect()
        };
        for (id, tx) in pending {
            tracing::debug!(decision_id = %id, "resolving escalation with shutdown sentinel");
            let _ = tx.send(SHUTDOWN_ANSWER.to_string());
        }
    }
}

#[cfg(test)]
#[path = "escalation_tests.rs"]
mod tests;
