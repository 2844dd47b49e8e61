//! # ai-gen-cache
//!
//! 面向按 Token 计费的生成式 AI 后端的缓存层：请求去重、分类内容池与命中统计。
//!
//! A cost and latency optimization layer that sits between an application
//! and pay-per-token generative AI backends.
//!
//! ## Overview
//!
//! Paid generation calls are slow and cost money. This crate avoids
//! redundant ones in two ways:
//!
//! - **Deduplication**: identical single-shot requests arriving within a
//!   short window (5 minutes by default) are answered from memory.
//! - **Warm content pools**: per-category pools of pre-generated items
//!   (trivia questions, vocabulary words, ...) are served instantly and
//!   topped up by background refills before they run dry.
//! - **Prefetch**: continuations for each choice a user is offered are
//!   generated in the background, once per choice.
//!
//! Hits, misses and tokens saved are aggregated and persisted so savings can
//! be reported across restarts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_gen_cache::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(Clone)]
//! struct Word { id: ItemId, text: String }
//!
//! impl PoolItem for Word {
//!     fn item_id(&self) -> ItemId { self.id }
//!     fn dedup_key(&self) -> Option<String> { Some(self.text.to_lowercase()) }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ai_gen_cache::Result<()> {
//!     let cache: CacheFacade<Word> = CacheFacadeBuilder::new()
//!         .config(CacheConfig::default())
//!         .app_data_dir("my-app")?
//!         .build()?;
//!
//!     let generator = Arc::new(|category: String, count: usize| async move {
//!         // Call the provider and parse its output here.
//!         Ok::<_, ai_gen_cache::Error>(
//!             (0..count)
//!                 .map(|i| Word { id: ItemId::new(), text: format!("{category}-{i}") })
//!                 .collect::<Vec<_>>(),
//!         )
//!     });
//!     let words = cache.draw_or_generate("vocab|es|a1", 5, &generator).await?;
//!     assert!(words.len() <= 5);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`facade`] | The single entry point, [`CacheFacade`] |
//! | [`cache`] | Exact-match dedup cache, continuation prefetch and key generation |
//! | [`pool`] | Category content pools with refill slots |
//! | [`stats`] | Counters, snapshots and durable stats stores |
//! | [`generation`] | Collaborator traits for single-shot and batch generation |
//! | [`tokens`] | Token usage and cost estimation |
//! | [`config`] | Configuration and YAML loading |

pub mod cache;
pub mod config;
pub mod facade;
pub mod generation;
pub mod pool;
pub mod stats;
pub mod tokens;

pub use facade::prelude;

// Re-export main types for convenience
pub use cache::{CacheKey, DedupCache, PrefetchCache};
pub use config::CacheConfig;
pub use facade::{CacheFacade, CacheFacadeBuilder, Response};
pub use generation::{BatchGenerator, Generation, GenerationRequest, Generator};
pub use pool::{ContentPoolManager, ItemId, PoolItem, PoolProfile};
pub use stats::{CacheStats, StatsAggregator};
pub use tokens::{ModelPricing, TokenUsage};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
