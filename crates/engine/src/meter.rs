// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token metering over each agent's stream-json output.
//!
//! The supervisor feeds whole stdout lines here; usage events accumulate
//! into per-agent totals priced against the pricing table and mirrored
//! to `usage.json`. Observer notifications go over a channel so a dead
//! or slow subscriber can never disturb stream parsing.

use crate::pricing::{round6, PricingTable};
use arch_core::UsageTotals;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// One structured event from an agent's stdout stream.
///
/// Unknown event types and non-JSON lines are passed over silently; the
/// AI CLI is free to add event kinds we do not care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Free prose from the agent, kept for the live activity view.
    Assistant {
        #[serde(default)]
        text: String,
    },
    /// Token counters for one turn.
    Usage {
        #[serde(default)]
        input_tokens: u64,
        #[serde(default)]
        output_tokens: u64,
        #[serde(default)]
        cache_read_input_tokens: u64,
        #[serde(default)]
        cache_creation_input_tokens: u64,
    },
    /// Terminal event carrying the resume token.
    Result {
        #[serde(default)]
        session_id: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// Notification sent to the observer channel after each usage event.
#[derive(Debug, Clone)]
pub struct UsageUpdate {
    pub agent_id: String,
    pub totals: UsageTotals,
}

/// Accumulates per-agent token usage and cost.
pub struct TokenMeter {
    state_dir: Option<PathBuf>,
    pricing: PricingTable,
    agents: Mutex<HashMap<String, UsageTotals>>,
    observer: Mutex<Option<mpsc::Sender<UsageUpdate>>>,
}

impl TokenMeter {
    pub fn new(state_dir: Option<PathBuf>, pricing: PricingTable) -> Self {
        let meter = Self {
            state_dir,
            pricing,
            agents: Mutex::new(HashMap::new()),
            observer: Mutex::new(None),
        };
        meter.load();
        meter
    }

    /// Attach the observer channel (e.g. the dashboard's live view).
    pub fn set_observer(&self, tx: mpsc::Sender<UsageUpdate>) {
        *self.observer.lock() = Some(tx);
    }

    /// Register an agent for tracking. Idempotent.
    pub fn register_agent(&self, agent_id: &str, model: &str) {
        let mut agents = self.agents.lock();
        if !agents.contains_key(agent_id) {
            agents.insert(agent_id.to_string(), UsageTotals::new(model));
            drop(agents);
            self.persist();
        }
    }

    /// Parse one stdout line. Returns the decoded event, with usage
    /// events already folded into the agent's totals.
    pub fn observe_line(&self, agent_id: &str, line: &str) -> Option<StreamEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let event: StreamEvent = serde_json::from_str(line).ok()?;

        if let StreamEvent::Usage {
            input_tokens,
            output_tokens,
            cache_read_input_tokens,
            cache_creation_input_tokens,
        } = event
        {
            self.add_usage(
                agent_id,
                input_tokens,
                output_tokens,
                cache_read_input_tokens,
                cache_creation_input_tokens,
            );
        }

        Some(event)
    }

    fn add_usage(
        &self,
        agent_id: &str,
        input_tokens: u64,
        output_tokens: u64,
        cache_read_tokens: u64,
        cache_creation_tokens: u64,
    ) {
        let update = {
            let mut agents = self.agents.lock();
            let Some(totals) = agents.get_mut(agent_id) else {
                tracing::warn!(agent_id, "usage event for unregistered agent");
                return;
            };
            totals.input_tokens += input_tokens;
            totals.output_tokens += output_tokens;
            totals.cache_read_tokens += cache_read_tokens;
            totals.cache_creation_tokens += cache_creation_tokens;
            totals.turns += 1;

            let turn_cost = self.pricing.cost(
                &totals.model,
                input_tokens,
                output_tokens,
                cache_read_tokens,
                cache_creation_tokens,
            );
            totals.cost_usd = round6(totals.cost_usd + turn_cost);

            UsageUpdate { agent_id: agent_id.to_string(), totals: totals.clone() }
        };

        self.persist();
        self.notify(update);
    }

    /// Observer failures are logged and swallowed; they must never
    /// propagate back into stream parsing.
    fn notify(&self, update: UsageUpdate) {
        let observer = self.observer.lock();
        if let Some(tx) = observer.as_ref() {
            if let Err(e) = tx.try_send(update) {
                tracing::debug!(error = %e, "usage observer notification dropped");
            }
        }
    }

    pub fn totals(&self, agent_id: &str) -> Option<UsageTotals> {
        self.agents.lock().get(agent_id).cloned()
    }

    pub fn all_totals(&self) -> HashMap<String, UsageTotals> {
        self.agents.lock().clone()
    }

    /// Accumulated cost across every agent.
    pub fn total_cost(&self) -> f64 {
        round6(self.agents.lock().values().map(|t| t.cost_usd).sum())
    }

    pub fn remove_agent(&self, agent_id: &str) -> bool {
        let removed = self.agents.lock().remove(agent_id).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    fn usage_path(dir: &Path) -> PathBuf {
        dir.join("usage.json")
    }

    fn persist(&self) {
        let Some(dir) = &self.state_dir else { return };
        let agents = self.agents.lock().clone();
        let path = Self::usage_path(dir);
        let tmp = dir.join(".usage.json.tmp");
        let result = serde_json::to_vec_pretty(&agents)
            .map_err(std::io::Error::other)
            .and_then(|bytes| std::fs::write(&tmp, bytes))
            .and_then(|()| std::fs::rename(&tmp, &path));
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to persist usage");
        }
    }

    fn load(&self) {
        let Some(dir) = &self.state_dir else { return };
        let path = Self::usage_path(dir);
        if !path.exists() {
            return;
        }
        match std::fs::read(&path)
            .map_err(std::io::Error::from)
            .and_then(|raw| serde_json::from_slice(&raw).map_err(std::io::Error::other))
        {
            Ok(agents) => *self.agents.lock() = agents,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load usage, starting empty")
            }
        }
    }
}

#[cfg(test)]
#[path = "meter_tests.rs"]
mod tests;
