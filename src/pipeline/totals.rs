//! Token usage deltas and running session totals.

use serde::{Deserialize, Serialize};

use crate::cli::Usage;

/// Token counts reported for a single assistant message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageUpdate {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}

impl From<&Usage> for TokenUsageUpdate {
    fn from(usage: &Usage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cache_read_tokens: usage.cache_read_input_tokens,
            cache_creation_tokens: usage.cache_creation_input_tokens,
        }
    }
}

/// Running totals for one session.
///
/// Counters only grow between resets. A compaction boundary zeroes the token
/// counters but keeps cost and request count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionTotals {
    pub total_cost: f64,
    pub total_tokens_input: u64,
    pub total_tokens_output: u64,
    pub total_cache_read_tokens: u64,
    pub total_cache_creation_tokens: u64,
    pub request_count: u64,
}

impl SessionTotals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a per-message usage update into the totals.
    pub fn record_usage(&mut self, update: &TokenUsageUpdate) {
        self.total_tokens_input = self.total_tokens_input.saturating_add(update.input_tokens);
        self.total_tokens_output = self.total_tokens_output.saturating_add(update.output_tokens);
        self.total_cache_read_tokens = self
            .total_cache_read_tokens
            .saturating_add(update.cache_read_tokens);
        self.total_cache_creation_tokens = self
            .total_cache_creation_tokens
            .saturating_add(update.cache_creation_tokens);
    }

    /// Count a completed request and add its cost.
    ///
    /// Negative or non-finite costs are ignored.
    pub fn record_request(&mut self, cost_usd: Option<f64>) {
        self.request_count = self.request_count.saturating_add(1);
        if let Some(cost) = cost_usd.filter(|c| c.is_finite() && *c >= 0.0) {
            self.total_cost += cost;
        }
    }

    /// Zero the token counters (compaction boundary).
    pub fn reset_tokens(&mut self) {
        self.total_tokens_input = 0;
        self.total_tokens_output = 0;
        self.total_cache_read_tokens = 0;
        self.total_cache_creation_tokens = 0;
    }

    /// Zero everything (new session).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Input plus output tokens.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens_input
            .saturating_add(self.total_tokens_output)
    }
}
