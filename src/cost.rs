//! Session cost accounting for model calls.

use std::collections::HashMap;

/// Per-token rate applied when the model name is not in the rate table.
const DEFAULT_RATE: f64 = 0.000_001;

/// Accumulates token usage and monetary cost across a session.
///
/// Totals are monotonically non-decreasing; one meter is owned per session
/// and discarded with it.
#[derive(Debug)]
pub struct CostMeter {
    total_tokens: u64,
    total_cost: f64,
    rates: HashMap<String, f64>,
}

impl Default for CostMeter {
    fn default() -> Self {
        let mut rates = HashMap::new();
        rates.insert("gemini-flash-latest".to_string(), 0.000_001);
        rates.insert("gemini-pro".to_string(), 0.000_002);
        Self {
            total_tokens: 0,
            total_cost: 0.0,
            rates,
        }
    }
}

impl CostMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one model call and return its cost.
    ///
    /// Unrecognized models are billed at [`DEFAULT_RATE`].
    pub fn record(&mut self, model: &str, tokens: u64) -> f64 {
        let rate = self.rates.get(model).copied().unwrap_or(DEFAULT_RATE);
        let cost = tokens as f64 * rate;
        self.total_tokens += tokens;
        self.total_cost += cost;
        cost
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }
}
