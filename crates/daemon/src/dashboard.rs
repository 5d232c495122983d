// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The kernel's contract with the dashboard.
//!
//! The dashboard is a reader plus one writer: it polls a snapshot at a
//! bounded interval and answers queued decisions. Rendering lives
//! elsewhere.

use arch_bus::EscalationRegistry;
use arch_core::{AgentRecord, Decision, Message, UsageTotals};
use arch_engine::TokenMeter;
use arch_storage::StateStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Intended polling cadence.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// One poll's worth of kernel state.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub agents: Vec<AgentRecord>,
    pub messages: Vec<Message>,
    pub pending_decisions: Vec<Decision>,
    pub usage: HashMap<String, UsageTotals>,
    pub total_cost_usd: f64,
}

/// Read + answer handle given to the dashboard.
#[derive(Clone)]
pub struct DashboardHandle {
    store: Arc<StateStore>,
    meter: Arc<TokenMeter>,
    escalations: EscalationRegistry,
}

impl DashboardHandle {
    pub fn new(
        store: Arc<StateStore>,
        meter: Arc<TokenMeter>,
        escalations: EscalationRegistry,
    ) -> Self {
        Self { store, meter, escalations }
    }

    pub fn poll(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            agents: self.store.agents(),
            messages: self.store.all_messages(),
            pending_decisions: self.store.pending_decisions(),
            usage: self.meter.all_totals(),
            total_cost_usd: self.meter.total_cost(),
        }
    }

    /// Resolve a queued decision: record the answer, then unblock the
    /// tool call parked on it. Exactly one call resolves each decision;
    /// repeats return false and change nothing.
    pub fn answer_decision(&self, decision_id: &str, answer: &str) -> bool {
        match self.store.decision(decision_id) {
            Some(d) if d.is_resolved() => return false,
            None => return false,
            Some(_) => {}
        }
        self.store.answer_decision(decision_id, answer);
        self.escalations.resolve(decision_id, answer);
        true
    }
}

#[cfg(test)]
#[path = "dashboard_tests.rs"]
mod tests;
