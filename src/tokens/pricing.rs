//! Pricing of tokens saved by the cache.

use serde::{Deserialize, Serialize};

/// Per-1K-token rates of the model whose calls the cache avoids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model: String,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".into()
}

impl ModelPricing {
    pub fn new(model: &str, input: f64, output: f64) -> Self {
        Self {
            model: model.into(),
            input_cost_per_1k: input,
            output_cost_per_1k: output,
            currency: default_currency(),
        }
    }

    /// Cost of tokens whose prompt/completion split is unknown.
    ///
    /// Savings counters only track a token total, so they are priced at the
    /// mean of the input and output rates.
    pub fn blended_cost(&self, tokens: u64) -> CostEstimate {
        let rate = (self.input_cost_per_1k + self.output_cost_per_1k) / 2.0;
        CostEstimate {
            model: self.model.clone(),
            tokens,
            total_cost: (tokens as f64 / 1000.0) * rate,
            currency: self.currency.clone(),
        }
    }

    pub fn gpt_4o_mini() -> Self {
        Self::new("gpt-4o-mini", 0.00015, 0.0006)
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self::gpt_4o_mini()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub model: String,
    pub tokens: u64,
    pub total_cost: f64,
    pub currency: String,
}

impl CostEstimate {
    pub fn format(&self) -> String {
        format!("{} {:.4}", self.currency, self.total_cost)
    }
}
