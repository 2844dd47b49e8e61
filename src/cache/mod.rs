//! 请求去重缓存模块：在短时间窗口内复用完全相同请求的生成结果。
//!
//! # Request Deduplication Cache
//!
//! Identical single-shot requests that arrive within a short window are
//! answered from memory instead of paying for a second generation.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`DedupCache`] | TTL-bounded exact-match cache of [`Generation`](crate::generation::Generation)s |
//! | [`CacheKey`] | SHA-256 digest identifying one request |
//! | [`CacheKeyGenerator`] | Normalizes `(text, persona, feature)` and hashes it |
//! | [`PrefetchCache`] | Bounded store of speculative generations keyed by `(context, choice)` |
//!
//! ## Eligibility
//!
//! The cache is context-agnostic. Only callers know whether a request carries
//! conversation history that makes its answer unique; such requests must not
//! be looked up here. [`CacheFacade::respond`](crate::facade::CacheFacade::respond)
//! applies that rule for [`GenerationRequest`](crate::generation::GenerationRequest)s.
//!
//! ## Example
//!
//! ```rust
//! use ai_gen_cache::cache::DedupCache;
//! use ai_gen_cache::generation::Generation;
//! use ai_gen_cache::tokens::TokenUsage;
//!
//! let cache = DedupCache::default();
//! let key = cache.generate_key("Translate 'cat'", "tutor", "translate");
//! assert!(cache.get(&key).is_none());
//! cache.set(key.clone(), Generation::new("gato", TokenUsage::new(12, 3)));
//! assert_eq!(cache.get(&key).unwrap().content, "gato");
//! ```

mod dedup;
mod key;
mod prefetch;

pub use dedup::{DedupCache, DEFAULT_DEDUP_TTL, DEFAULT_SOFT_CAPACITY};
pub use key::{CacheKey, CacheKeyGenerator};
pub use prefetch::{PrefetchCache, PrefetchSlot, DEFAULT_PREFETCH_CAPACITY};
