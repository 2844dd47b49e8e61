//! 内容池模块：按类别维护预生成内容，低水位时后台补充。
//!
//! # Category Content Pools
//!
//! Pools hold pre-generated, not-yet-served items per category key so that
//! requests for "5 easy trivia questions" are answered from memory while a
//! background task tops the pool up.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ContentPoolManager`] | One independently locked pool per category key |
//! | [`PoolItem`] | Trait for domain items: stable [`ItemId`] plus optional de-dup key |
//! | [`PoolProfile`] | Low-water mark, ceiling, refill batch size, per-item cost |
//! | [`PoolProfiles`] | Profile lookup by exact key or longest key prefix |
//! | [`RefillGuard`] | Exclusive, self-releasing claim on a pool's refill slot |
//!
//! ## Semantics
//!
//! - **Draw** removes N items chosen uniformly at random without replacement,
//!   or misses when fewer than N are held. It never waits on the network.
//! - **Fill** appends new items, skips ones whose id or de-dup key is already
//!   present, then drops the oldest items above the ceiling.
//! - **Refill** slots are exclusive: at most one refill per key is in flight.
//!
//! Category keys are opaque strings such as `"trivia|easy"` or
//! `"vocab|es|a2|food"`; callers compose them.

mod category;
mod item;
mod manager;
mod profile;

pub use category::{FillOutcome, PoolStatus};
pub use item::{ItemId, PoolItem};
pub use manager::{ContentPoolManager, RefillGuard};
pub use profile::{PoolProfile, PoolProfiles};
