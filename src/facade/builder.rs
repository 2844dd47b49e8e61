use crate::cache::{CacheKeyGenerator, DedupCache, PrefetchCache};
use crate::config::CacheConfig;
use crate::facade::cache::CacheFacade;
use crate::pool::{ContentPoolManager, PoolItem};
use crate::stats::{FileStatsStore, StatsAggregator, StatsStore};
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// Builder for the cache facade.
///
/// Stats store precedence: an explicitly injected store, then
/// `CacheConfig::stats_path`, then none (counters kept in memory only).
pub struct CacheFacadeBuilder {
    config: CacheConfig,
    store: Option<Arc<dyn StatsStore>>,
    restore: bool,
}

impl CacheFacadeBuilder {
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            store: None,
            restore: true,
        }
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject the durable store for statistics.
    pub fn stats_store(mut self, store: Arc<dyn StatsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Persist statistics under the platform data directory for `app_name`.
    pub fn app_data_dir(self, app_name: &str) -> Result<Self> {
        let store = FileStatsStore::in_data_dir(app_name)?;
        Ok(self.stats_store(Arc::new(store)))
    }

    /// Do not load previously persisted statistics on build.
    pub fn skip_restore(mut self) -> Self {
        self.restore = false;
        self
    }

    pub fn build<T: PoolItem>(self) -> Result<CacheFacade<T>> {
        self.config.validate()?;
        let config = self.config;

        let mut keys = CacheKeyGenerator::new();
        if let Some(ref salt) = config.key_salt {
            keys = keys.with_salt(salt.clone());
        }
        let prefetch =
            PrefetchCache::new(config.prefetch_capacity).with_key_generator(keys.clone());
        let dedup = DedupCache::new(config.dedup_ttl(), config.dedup_soft_capacity)
            .with_key_generator(keys);
        let pools = ContentPoolManager::new(config.pool_profiles());

        let store = self.store.or_else(|| {
            config
                .stats_path
                .clone()
                .map(|p| Arc::new(FileStatsStore::new(p)) as Arc<dyn StatsStore>)
        });
        let stats = StatsAggregator::new(store).with_persist_every(config.persist_every);
        if self.restore {
            let outcome = stats.restore();
            info!(?outcome, "cache stats restore");
        }

        Ok(CacheFacade::from_parts(
            Arc::new(dedup),
            Arc::new(pools),
            Arc::new(prefetch),
            Arc::new(stats),
        )
        .with_pricing(config.pricing)
        .with_prefetch_category(config.prefetch_category))
    }
}

impl Default for CacheFacadeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
