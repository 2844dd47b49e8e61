//! Minimal prelude for application code.
//!
//! Goal: reduce import noise without hiding important concepts.

pub use crate::cache::CacheKey;
pub use crate::config::CacheConfig;
pub use crate::facade::{CacheFacade, CacheFacadeBuilder, Response};
pub use crate::generation::{BatchGenerator, Generation, GenerationRequest, Generator};
pub use crate::pool::{ItemId, PoolItem, PoolProfile};
pub use crate::stats::{CacheStats, FileStatsStore, StatsStore};
pub use crate::tokens::{ModelPricing, TokenUsage};
