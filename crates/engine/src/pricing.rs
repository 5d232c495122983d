// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model pricing.
//!
//! Rates are loaded from `pricing.yaml` (per-million-token USD, keyed by
//! model id) so price changes ship as data. The built-in table is the
//! fallback when the file is absent or unreadable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Model whose rates apply when an unknown model id is metered.
pub const FALLBACK_MODEL: &str = "claude-sonnet-4-6";

/// Per-million-token USD rates for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_write: f64,
}

/// Pricing table keyed by model id.
#[derive(Debug, Clone)]
pub struct PricingTable {
    rates: HashMap<String, ModelRates>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self { rates: builtin_rates() }
    }
}

fn builtin_rates() -> HashMap<String, ModelRates> {
    let opus = ModelRates { input: 15.00, output: 75.00, cache_read: 1.50, cache_write: 18.75 };
    let sonnet = ModelRates { input: 3.00, output: 15.00, cache_read: 0.30, cache_write: 3.75 };
    let haiku = ModelRates { input: 0.80, output: 4.00, cache_read: 0.08, cache_write: 1.00 };

    HashMap::from([
        ("claude-opus-4-5".to_string(), opus),
        ("claude-opus-4-6".to_string(), opus),
        ("claude-sonnet-4-5".to_string(), sonnet),
        ("claude-sonnet-4-6".to_string(), sonnet),
        ("claude-haiku-4-5".to_string(), haiku),
    ])
}

impl PricingTable {
    /// Load rates from a YAML file, falling back to the built-in table
    /// with a logged warning on any failure.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read pricing file, using builtin rates");
                return Self::default();
            }
        };
        match serde_yaml::from_str::<HashMap<String, ModelRates>>(&raw) {
            Ok(rates) if !rates.is_empty() => Self { rates },
            Ok(_) => {
                tracing::warn!(path = %path.display(), "empty pricing file, using builtin rates");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid pricing file, using builtin rates");
                Self::default()
            }
        }
    }

    pub fn from_rates(rates: HashMap<String, ModelRates>) -> Self {
        Self { rates }
    }

    /// Rates for a model; unknown ids price at the fallback model.
    pub fn rates_for(&self, model: &str) -> ModelRates {
        if let Some(rates) = self.rates.get(model) {
            return *rates;
        }
        tracing::warn!(model, fallback = FALLBACK_MODEL, "unknown model, using fallback pricing");
        self.rates.get(FALLBACK_MODEL).copied().unwrap_or(ModelRates {
            input: 0.0,
            output: 0.0,
            cache_read: 0.0,
            cache_write: 0.0,
        })
    }

    /// Cost in USD for one usage event, rounded to 6 decimal places.
    pub fn cost(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cache_read_tokens: u64,
        cache_creation_tokens: u64,
    ) -> f64 {
        let rates = self.rates_for(model);
        let cost = (input_tokens as f64 / 1e6) * rates.input
            + (output_tokens as f64 / 1e6) * rates.output
            + (cache_read_tokens as f64 / 1e6) * rates.cache_read
            + (cache_creation_tokens as f64 / 1e6) * rates.cache_write;
        round6(cost)
    }
}

/// Round to 6 decimal places to keep floating point noise out of
/// persisted totals.
pub fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

#[cfg(test)]
#[path = "pricing_tests.rs"]
mod tests;
