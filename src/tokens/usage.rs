//! Token usage reported by a generation call.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// Prompt tokens the provider served from its own prompt cache.
    #[serde(default)]
    pub cached_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            cached_tokens: 0,
        }
    }

    pub fn with_cached_tokens(mut self, cached: u32) -> Self {
        self.cached_tokens = cached;
        self
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens as u64 + self.completion_tokens as u64
    }

    pub fn is_zero(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0
    }
}
