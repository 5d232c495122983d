// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending decisions: questions queued for the human operator.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a pending decision.
    pub struct DecisionId("dcn-");
}

/// A question awaiting (or resolved by) human input.
///
/// Exactly one agent tool call blocks on each unresolved decision; the
/// dashboard resolves it via `answer_decision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub asked_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl Decision {
    pub fn is_resolved(&self) -> bool {
        self.answer.is_some()
    }
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;
