//! 缓存统计模块：汇总命中、未命中与节省的 Token，并持久化到本地存储。
//!
//! # Cache Statistics
//!
//! Aggregates hit/miss counters, tokens saved, per-category breakdowns and
//! provider-side prompt-cache hits. The counters survive restarts through a
//! [`StatsStore`]; pool contents do not.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`StatsAggregator`] | Thread-safe counters with debounced persistence |
//! | [`CacheStats`] | Immutable snapshot, also the persisted JSON shape |
//! | [`StatsStore`] | Trait for the durable blob store |
//! | [`FileStatsStore`] | Atomic file store in the platform data directory |
//! | [`MemoryStatsStore`] | In-memory store for testing |
//!
//! ## Failure policy
//!
//! Recording never fails. `restore` falls back to zeroed counters on a
//! missing or corrupt snapshot and logs a warning; auto-persist failures are
//! logged and skipped.

mod aggregator;
mod store;

pub use aggregator::{CacheStats, RestoreOutcome, StatsAggregator, DEFAULT_PERSIST_EVERY};
pub use store::{FileStatsStore, MemoryStatsStore, StatsStore, STATS_FILE_NAME};
