//! 缓存门面：应用唯一需要交互的入口，组合去重缓存、内容池与统计。
//!
//! # Cache Facade
//!
//! [`CacheFacade`] composes one [`DedupCache`](crate::cache::DedupCache), one
//! [`ContentPoolManager`](crate::pool::ContentPoolManager) and one
//! [`StatsAggregator`](crate::stats::StatsAggregator). None of them know
//! about each other; all coordination happens here.
//!
//! | Request shape | Path |
//! |---------------|------|
//! | one prompt, one answer | [`CacheFacade::get_or_generate`] / [`CacheFacade::respond`] |
//! | N items of a category | [`CacheFacade::draw_or_generate`] |
//!
//! Construct it once at the application's composition root with
//! [`CacheFacadeBuilder`] and share it by cloning (clones share state).

mod builder;
mod cache;
pub mod prelude;

pub use builder::CacheFacadeBuilder;
pub use cache::{CacheFacade, Response};
