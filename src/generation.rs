//! Generation collaborators.
//!
//! The cache never talks to a provider itself. Applications plug their
//! dispatch layer in through [`Generator`] (one request, one answer) and
//! [`BatchGenerator`] (N items of a category for a pool).

use crate::tokens::TokenUsage;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Result of a single paid generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub content: String,
    pub usage: TokenUsage,
    /// Provider that served the call, used for native prompt-cache accounting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl Generation {
    pub fn new(content: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            content: content.into(),
            usage,
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// A single-shot request as seen by the dedup layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub text: String,
    pub persona: String,
    pub feature_type: String,
    /// Prior conversation turns. Requests with context are never deduplicated.
    pub context: Vec<String>,
}

impl GenerationRequest {
    pub fn new(
        text: impl Into<String>,
        persona: impl Into<String>,
        feature_type: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            persona: persona.into(),
            feature_type: feature_type.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }

    pub fn is_cacheable(&self) -> bool {
        self.context.is_empty()
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}

/// Produces a batch of pool items for one category key.
///
/// May return fewer items than asked for; the short batch is still used.
#[async_trait]
pub trait BatchGenerator<T>: Send + Sync {
    async fn generate_batch(&self, category: &str, count: usize) -> Result<Vec<T>>;
}

#[async_trait]
impl<T, F, Fut> BatchGenerator<T> for F
where
    T: Send + 'static,
    F: Fn(String, usize) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    async fn generate_batch(&self, category: &str, count: usize) -> Result<Vec<T>> {
        (self)(category.to_string(), count).await
    }
}
