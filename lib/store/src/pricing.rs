//! Model pricing lookup and cost estimation.

use runforge_core::Usage;
use serde::{Deserialize, Serialize};

/// Per-model pricing in USD per million tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Provider name.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Pricing table version.
    pub version: String,
    /// USD per million uncached input tokens.
    pub input_usd_per_mtok: f64,
    /// USD per million output tokens.
    pub output_usd_per_mtok: f64,
    /// USD per million cached input tokens.
    pub cached_input_usd_per_mtok: f64,
}

/// Estimates the cost of a run in USD from its usage.
///
/// Cached input tokens are billed at the cached rate; the remaining input
/// tokens at the full rate. Reasoning output is already included in
/// `output_tokens`.
#[must_use]
pub fn estimate_cost_usd(usage: &Usage, pricing: &ModelPricing) -> f64 {
    let cached = usage.cached_input_tokens.max(0) as f64;
    let uncached = (usage.input_tokens - usage.cached_input_tokens).max(0) as f64;
    let output = usage.output_tokens.max(0) as f64;

    (uncached * pricing.input_usd_per_mtok
        + cached * pricing.cached_input_usd_per_mtok
        + output * pricing.output_usd_per_mtok)
        / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing() -> ModelPricing {
        ModelPricing {
            provider: "anthropic".to_string(),
            model: "fast".to_string(),
            version: "2026-01".to_string(),
            input_usd_per_mtok: 3.0,
            output_usd_per_mtok: 15.0,
            cached_input_usd_per_mtok: 0.3,
        }
    }

    #[test]
    fn estimate_splits_cached_input() {
        let usage = Usage {
            input_tokens: 1_000_000,
            output_tokens: 0,
            total_tokens: 1_000_000,
            cached_input_tokens: 500_000,
            reasoning_output_tokens: 0,
        };
        let cost = estimate_cost_usd(&usage, &pricing());
        // 0.5M at $3 + 0.5M at $0.30
        assert!((cost - 1.65).abs() < 1e-9);
    }

    #[test]
    fn estimate_charges_output() {
        let usage = Usage::new(0, 2_000_000);
        let cost = estimate_cost_usd(&usage, &pricing());
        assert!((cost - 30.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_tolerates_inconsistent_counts() {
        // cached > input should not produce a negative charge
        let usage = Usage {
            input_tokens: 100,
            output_tokens: 0,
            total_tokens: 100,
            cached_input_tokens: 500,
            reasoning_output_tokens: 0,
        };
        let cost = estimate_cost_usd(&usage, &pricing());
        assert!(cost >= 0.0);
    }
}
