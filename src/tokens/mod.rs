//! Token 用量与成本估算模块：记录生成调用的 Token 用量，并将节省的 Token 折算为费用。
//!
//! # Token Usage and Cost Estimation Module
//!
//! Every paid generation reports how many tokens it consumed. The cache uses
//! that signal twice: a dedup hit saves exactly the tokens the original call
//! spent, and the statistics report converts accumulated savings into an
//! estimated currency amount.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TokenUsage`] | Prompt / completion / provider-cached token counts |
//! | [`ModelPricing`] | Per-1K-token rates of the model the cache stands in for |
//! | [`CostEstimate`] | Estimated money saved |
//!
//! ## Example
//!
//! ```rust
//! use ai_gen_cache::tokens::{ModelPricing, TokenUsage};
//!
//! let usage = TokenUsage::new(120, 380);
//! let pricing = ModelPricing::gpt_4o_mini();
//! let estimate = pricing.blended_cost(usage.total());
//! println!("A cache hit on this call saves {}", estimate.format());
//! ```

mod pricing;
mod usage;

pub use pricing::{CostEstimate, ModelPricing};
pub use usage::TokenUsage;
