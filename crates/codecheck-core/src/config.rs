//! Engine tuning knobs.

use serde::{Deserialize, Serialize};

use crate::evidence::normalize::DEFAULT_MAX_DEPTH;

/// Limits applied to one `evaluate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Judgments allowed in flight at once.
    pub max_concurrent: usize,
    /// Budget for a single judgment, backend call included.
    pub pair_timeout_ms: u64,
    /// Budget for the whole judgment phase. `None` disables the deadline.
    pub call_budget_ms: Option<u64>,
    /// Nesting depth the evidence normalizer descends into.
    pub max_trace_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            pair_timeout_ms: 30_000,
            call_budget_ms: Some(300_000),
            max_trace_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_pair_timeout_ms(mut self, pair_timeout_ms: u64) -> Self {
        self.pair_timeout_ms = pair_timeout_ms;
        self
    }

    pub fn with_call_budget_ms(mut self, call_budget_ms: Option<u64>) -> Self {
        self.call_budget_ms = call_budget_ms;
        self
    }

    pub fn with_max_trace_depth(mut self, max_trace_depth: usize) -> Self {
        self.max_trace_depth = max_trace_depth;
        self
    }
}
