use crate::cache::{CacheKey, DedupCache, PrefetchCache};
use crate::config::CacheConfig;
use crate::facade::builder::CacheFacadeBuilder;
use crate::generation::{BatchGenerator, Generation, Generator, GenerationRequest};
use crate::pool::{ContentPoolManager, FillOutcome, PoolItem, PoolStatus, RefillGuard};
use crate::stats::{CacheStats, RestoreOutcome, StatsAggregator};
use crate::tokens::{ModelPricing, TokenUsage};
use crate::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Answer to a single-shot request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub content: String,
    /// Tokens paid for this call. Zero when served from the dedup cache.
    pub usage: TokenUsage,
    pub provider: Option<String>,
    pub cache_hit: bool,
}

impl Response {
    fn cached(generation: Generation) -> Self {
        Self {
            content: generation.content,
            usage: TokenUsage::default(),
            provider: generation.provider,
            cache_hit: true,
        }
    }

    fn fresh(generation: Generation) -> Self {
        Self {
            content: generation.content,
            usage: generation.usage,
            provider: generation.provider,
            cache_hit: false,
        }
    }
}

/// Single entry point for cached generation.
///
/// Single-shot requests go through the dedup cache; "N items of category K"
/// requests go through the content pools; speculative continuations go
/// through the prefetch cache. Each falls back to the supplied generator on
/// a miss and stores what it produced.
pub struct CacheFacade<T: PoolItem> {
    dedup: Arc<DedupCache>,
    pools: Arc<ContentPoolManager<T>>,
    prefetch: Arc<PrefetchCache>,
    stats: Arc<StatsAggregator>,
    pricing: ModelPricing,
    prefetch_category: String,
}

impl<T: PoolItem> Clone for CacheFacade<T> {
    fn clone(&self) -> Self {
        Self {
            dedup: Arc::clone(&self.dedup),
            pools: Arc::clone(&self.pools),
            prefetch: Arc::clone(&self.prefetch),
            stats: Arc::clone(&self.stats),
            pricing: self.pricing.clone(),
            prefetch_category: self.prefetch_category.clone(),
        }
    }
}

impl<T: PoolItem> CacheFacade<T> {
    /// Build from a config, using `config.stats_path` (if any) for statistics.
    pub fn new(config: CacheConfig) -> Result<Self> {
        CacheFacadeBuilder::new().config(config).build()
    }

    pub fn from_parts(
        dedup: Arc<DedupCache>,
        pools: Arc<ContentPoolManager<T>>,
        prefetch: Arc<PrefetchCache>,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            dedup,
            pools,
            prefetch,
            stats,
            pricing: ModelPricing::default(),
            prefetch_category: CacheConfig::default().prefetch_category,
        }
    }

    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_prefetch_category(mut self, category: impl Into<String>) -> Self {
        self.prefetch_category = category.into();
        self
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    pub fn pools(&self) -> &ContentPoolManager<T> {
        &self.pools
    }

    pub fn prefetch_cache(&self) -> &PrefetchCache {
        &self.prefetch
    }

    pub fn stats_aggregator(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn pricing(&self) -> &ModelPricing {
        &self.pricing
    }

    /// Serve `key` from the dedup cache, or await `generate` and remember its result.
    ///
    /// A generation error is returned unchanged and nothing is cached.
    pub async fn get_or_generate<F, Fut>(&self, key: &CacheKey, generate: F) -> Result<Response>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Generation>>,
    {
        if let Some(cached) = self.dedup.get(key) {
            self.stats.record_dedup_hit(cached.usage.total());
            debug!(key = %key, tokens_saved = cached.usage.total(), "dedup hit");
            return Ok(Response::cached(cached));
        }

        self.stats.record_dedup_miss();
        debug!(key = %key, "dedup miss");
        let generation = generate().await?;
        record_native_cache(&self.stats, &generation);
        self.dedup.set(key.clone(), generation.clone());
        Ok(Response::fresh(generation))
    }

    /// Answer a request through `generator`, deduplicating when eligible.
    ///
    /// Requests carrying conversation context bypass the cache.
    pub async fn respond<G>(&self, request: &GenerationRequest, generator: &G) -> Result<Response>
    where
        G: Generator + ?Sized,
    {
        if !request.is_cacheable() {
            let generation = generator.generate(request).await?;
            record_native_cache(&self.stats, &generation);
            return Ok(Response::fresh(generation));
        }
        let key = self
            .dedup
            .generate_key(&request.text, &request.persona, &request.feature_type);
        self.get_or_generate(&key, || generator.generate(request))
            .await
    }

    /// Draw `count` items of `category`, generating a batch synchronously on a miss.
    ///
    /// A hit that leaves the pool below its low-water mark starts a background
    /// refill. At most one fetch per category runs at a time: a miss that
    /// finds one in flight waits for it and draws from the refilled pool
    /// instead of calling the generator itself. The fetching miss takes its
    /// items before waiters see the pool, so a short batch yields fewer items
    /// than asked for. `count == 0` returns nothing and records nothing.
    pub async fn draw_or_generate<G>(
        &self,
        category: &str,
        count: usize,
        generator: &Arc<G>,
    ) -> Result<Vec<T>>
    where
        G: BatchGenerator<T> + ?Sized + 'static,
    {
        if count == 0 {
            return Ok(Vec::new());
        }
        loop {
            if let Some(items) = self.pools.draw(category, count)? {
                self.served_from_pool(category, count, generator);
                return Ok(items);
            }
            let Some(guard) = self.pools.try_begin_fetch(category) else {
                debug!(category, count, "pool miss, waiting for in-flight fetch");
                self.pools.wait_for_refill(category).await;
                continue;
            };
            // A fetch may have landed between the miss and the claim.
            if let Some(items) = self.pools.draw(category, count)? {
                drop(guard);
                self.served_from_pool(category, count, generator);
                return Ok(items);
            }
            return self
                .fetch_on_miss(category, count, guard, generator.as_ref())
                .await;
        }
    }

    fn served_from_pool<G>(&self, category: &str, count: usize, generator: &Arc<G>)
    where
        G: BatchGenerator<T> + ?Sized + 'static,
    {
        let tokens_saved = count as u64 * self.pools.profile(category).tokens_per_item;
        self.stats.record_hit(category, tokens_saved);
        debug!(category, count, remaining = self.pools.len(category), "pool hit");
        self.spawn_refill_if_needed(category, generator);
    }

    async fn fetch_on_miss<G>(
        &self,
        category: &str,
        count: usize,
        guard: RefillGuard<T>,
        generator: &G,
    ) -> Result<Vec<T>>
    where
        G: BatchGenerator<T> + ?Sized,
    {
        self.stats.record_miss(category);
        let batch_size = guard.batch_size().max(count);
        debug!(category, count, batch_size, "pool miss, generating synchronously");
        let batch = generator.generate_batch(category, batch_size).await?;
        let (_, served) = guard.complete_and_take(batch, count);
        if served.len() < count {
            warn!(
                category,
                requested = count,
                served = served.len(),
                "batch generator returned too few items"
            );
        }
        Ok(served)
    }

    /// Start a background refill for `category` if it is low and none is running.
    ///
    /// Returns whether a refill was started.
    pub fn spawn_refill_if_needed<G>(&self, category: &str, generator: &Arc<G>) -> bool
    where
        G: BatchGenerator<T> + ?Sized + 'static,
    {
        let Some(guard) = self.pools.try_begin_refill(category) else {
            return false;
        };
        let generator = Arc::clone(generator);
        let stats = Arc::clone(&self.stats);
        debug!(category, batch_size = guard.batch_size(), "starting background refill");
        tokio::spawn(async move {
            let result = generator
                .generate_batch(guard.key(), guard.batch_size())
                .await;
            match result {
                Ok(items) => {
                    guard.complete(items);
                    stats.record_refill(true);
                }
                Err(e) => {
                    // Pool stays low; the next hit re-triggers the refill.
                    warn!(category = guard.key(), error = %e, "background refill failed");
                    stats.record_refill(false);
                }
            }
        });
        true
    }

    /// Synchronously fill a pool that is below its low-water mark.
    ///
    /// Meant for startup warm-up. Does nothing if the pool is healthy or a
    /// refill is already running.
    pub async fn prewarm<G>(&self, category: &str, generator: &G) -> Result<FillOutcome>
    where
        G: BatchGenerator<T> + ?Sized,
    {
        let Some(guard) = self.pools.try_begin_refill(category) else {
            return Ok(FillOutcome::default());
        };
        let items = generator
            .generate_batch(category, guard.batch_size())
            .await?;
        Ok(guard.complete(items))
    }

    /// Generate, in the background, the continuation of `context` for each choice.
    ///
    /// Choices whose continuation is already stored or being fetched are
    /// skipped. `request_for` builds the generation request for one choice.
    /// Failures are logged and leave nothing behind. Returns how many
    /// fetches were started.
    pub fn prefetch_continuations<G, F>(
        &self,
        context: &[String],
        choices: &[String],
        request_for: F,
        generator: &Arc<G>,
    ) -> usize
    where
        G: Generator + ?Sized + 'static,
        F: Fn(&str) -> GenerationRequest,
    {
        let mut started = 0;
        for choice in choices {
            let key = self.prefetch.generate_key(context, choice);
            let Some(slot) = self.prefetch.try_begin(&key) else {
                continue;
            };
            let request = request_for(choice);
            let generator = Arc::clone(generator);
            let stats = Arc::clone(&self.stats);
            let choice = choice.clone();
            tokio::spawn(async move {
                let result = generator.generate(&request).await;
                match result {
                    Ok(generation) => {
                        record_native_cache(&stats, &generation);
                        slot.complete(generation);
                        debug!(choice = %choice, "continuation prefetched");
                    }
                    Err(e) => {
                        warn!(choice = %choice, error = %e, "continuation prefetch failed");
                    }
                }
            });
            started += 1;
        }
        started
    }

    /// The prefetched continuation for `choice`, if it has landed.
    ///
    /// Counted as a hit or a miss under the prefetch category.
    pub fn prefetched(&self, context: &[String], choice: &str) -> Option<Response> {
        let key = self.prefetch.generate_key(context, choice);
        match self.prefetch.get(&key) {
            Some(generation) => {
                self.stats
                    .record_hit(&self.prefetch_category, generation.usage.total());
                Some(Response::cached(generation))
            }
            None => {
                self.stats.record_miss(&self.prefetch_category);
                None
            }
        }
    }

    pub fn is_prefetching(&self, context: &[String], choice: &str) -> bool {
        self.prefetch
            .is_pending(&self.prefetch.generate_key(context, choice))
    }

    pub fn pool_status(&self, category: &str) -> PoolStatus {
        self.pools.status(category)
    }

    pub fn pool_statuses(&self) -> Vec<PoolStatus> {
        self.pools.statuses()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Human-readable stats report, with savings priced at the configured rates.
    pub fn report(&self) -> String {
        self.stats().summary(&self.pricing)
    }

    pub fn persist_stats(&self) -> Result<()> {
        self.stats.persist()
    }

    pub fn restore_stats(&self) -> RestoreOutcome {
        self.stats.restore()
    }

    pub fn reset_stats(&self) -> Result<()> {
        self.stats.reset()
    }

    /// Drop all cached responses, pooled items and prefetched continuations.
    /// Statistics are kept.
    pub fn clear(&self) {
        self.dedup.clear();
        self.pools.clear_all();
        self.prefetch.clear();
    }
}

fn record_native_cache(stats: &StatsAggregator, generation: &Generation) {
    if generation.usage.cached_tokens == 0 {
        return;
    }
    if let Some(ref provider) = generation.provider {
        stats.record_provider_native_cache_hit(provider, generation.usage.cached_tokens as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{ItemId, PoolProfile};
    use crate::Error;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    struct Question {
        id: ItemId,
        text: String,
    }

    impl PoolItem for Question {
        fn item_id(&self) -> ItemId {
            self.id
        }
        fn dedup_key(&self) -> Option<String> {
            Some(self.text.to_lowercase())
        }
    }

    #[derive(Default)]
    struct CountingBatch {
        calls: AtomicUsize,
        short_by: usize,
    }

    #[async_trait]
    impl BatchGenerator<Question> for CountingBatch {
        async fn generate_batch(&self, category: &str, count: usize) -> Result<Vec<Question>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let n = count.saturating_sub(self.short_by);
            Ok((0..n)
                .map(|i| Question {
                    id: ItemId::new(),
                    text: format!("{category} #{call}-{i}"),
                })
                .collect())
        }
    }

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Generation::new(
                format!("echo: {}", request.text),
                TokenUsage::new(10, 15).with_cached_tokens(4),
            )
            .with_provider("openai"))
        }
    }

    fn facade() -> CacheFacade<Question> {
        CacheFacadeBuilder::new()
            .config(CacheConfig::new().with_default_profile(PoolProfile::new(5, 100, 20)))
            .skip_restore()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_or_generate_dedups() {
        let f = facade();
        let key = f.dedup().generate_key("hello", "", "");
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let generate = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(Generation::new("hi there", TokenUsage::new(5, 7)))
        };

        let first = f.get_or_generate(&key, generate).await.unwrap();
        let second = f.get_or_generate(&key, generate).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!first.cache_hit);
        assert_eq!(first.usage.total(), 12);
        assert!(second.cache_hit);
        assert_eq!(second.content, "hi there");
        assert!(second.usage.is_zero());
        let stats = f.stats();
        assert_eq!((stats.dedup_hits, stats.dedup_misses), (1, 1));
        assert_eq!(stats.dedup_tokens_saved, 12);
    }

    #[tokio::test]
    async fn test_generation_failure_not_cached() {
        let f = facade();
        let key = CacheKey::new("k");
        let err = f
            .get_or_generate(&key, || async { Err(Error::generation("upstream 500")) })
            .await
            .unwrap_err();
        assert!(err.is_generation());
        assert!(f.dedup().get(&key).is_none());
        let ok = f
            .get_or_generate(&key, || async { Ok(Generation::new("x", TokenUsage::new(1, 1))) })
            .await
            .unwrap();
        assert!(!ok.cache_hit);
    }

    #[tokio::test]
    async fn test_respond_records_native_cache_and_bypasses_context() {
        let f = facade();
        let echo = Echo {
            calls: AtomicUsize::new(0),
        };
        let req = GenerationRequest::new("bonjour", "tutor", "translate");
        assert!(!f.respond(&req, &echo).await.unwrap().cache_hit);
        assert!(f.respond(&req, &echo).await.unwrap().cache_hit);

        let with_context = req.clone().with_context(vec!["earlier".into()]);
        assert!(!f.respond(&with_context, &echo).await.unwrap().cache_hit);
        assert!(!f.respond(&with_context, &echo).await.unwrap().cache_hit);

        assert_eq!(echo.calls.load(Ordering::SeqCst), 3);
        let stats = f.stats();
        assert_eq!(stats.provider_cache_hits["openai"], 3);
        assert_eq!(stats.provider_tokens_cached["openai"], 12);
    }

    #[tokio::test]
    async fn test_draw_or_generate_cold_then_warm() {
        let f = facade();
        let generator = Arc::new(CountingBatch::default());

        let first = f.draw_or_generate("trivia|easy", 5, &generator).await.unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.pool_status("trivia|easy").len, 15);

        let second = f.draw_or_generate("trivia|easy", 5, &generator).await.unwrap();
        assert_eq!(second.len(), 5);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        let stats = f.stats();
        assert_eq!(stats.category_misses["trivia|easy"], 1);
        assert_eq!(stats.category_hits["trivia|easy"], 1);
        assert_eq!(stats.category_tokens_saved["trivia|easy"], 5 * 60);
    }

    #[tokio::test]
    async fn test_short_cold_batch_serves_partial() {
        let f = facade();
        let generator = Arc::new(CountingBatch {
            short_by: 18,
            ..Default::default()
        });
        let items = f.draw_or_generate("spelling", 5, &generator).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(f.pool_status("spelling").len, 0);
    }

    #[tokio::test]
    async fn test_draw_count_over_ceiling_is_error() {
        let f = facade();
        let generator = Arc::new(CountingBatch::default());
        let err = f.draw_or_generate("k", 101, &generator).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prewarm_fills_low_pool_once() {
        let f = facade();
        let generator = CountingBatch::default();
        let outcome = f.prewarm("vocab|es", &generator).await.unwrap();
        assert_eq!(outcome.added, 20);
        let again = f.prewarm("vocab|es", &generator).await.unwrap();
        assert_eq!(again, FillOutcome::default());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_keeps_stats() {
        let f = facade();
        let generator = Arc::new(CountingBatch::default());
        f.draw_or_generate("k", 1, &generator).await.unwrap();
        f.clear();
        assert_eq!(f.pool_status("k").len, 0);
        assert_eq!(f.stats().total_misses, 1);
    }

    #[tokio::test]
    async fn test_zero_count_draw_touches_nothing() {
        let f = facade();
        let generator = Arc::new(CountingBatch::default());
        let seed = (0..3)
            .map(|i| Question {
                id: ItemId::new(),
                text: format!("seed {i}"),
            })
            .collect();
        f.pools().fill("trivia|hard", seed);

        let items = f.draw_or_generate("trivia|hard", 0, &generator).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(f.stats().total_requests(), 0);
        assert!(!f.pool_status("trivia|hard").refill_in_flight);
        assert_eq!(f.pool_status("trivia|hard").len, 3);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prefetched_continuation_served_once_generated() {
        let f = facade();
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let context = vec!["You reach a fork in the road.".to_string()];
        let choices = vec!["Go left".to_string(), "Go right".to_string()];
        let request_for = |choice: &str| GenerationRequest::new(choice, "narrator", "story");

        assert!(f.prefetched(&context, "Go left").is_none());
        assert_eq!(f.prefetch_continuations(&context, &choices, request_for, &echo), 2);
        while f.is_prefetching(&context, "Go left") || f.is_prefetching(&context, "Go right") {
            tokio::task::yield_now().await;
        }
        assert_eq!(f.prefetch_continuations(&context, &choices, request_for, &echo), 0);

        let left = f.prefetched(&context, "Go left").unwrap();
        assert!(left.cache_hit);
        assert_eq!(left.content, "echo: Go left");
        assert_eq!(echo.calls.load(Ordering::SeqCst), 2);

        let stats = f.stats();
        assert_eq!(stats.category_hits["Story"], 1);
        assert_eq!(stats.category_misses["Story"], 1);
        assert_eq!(stats.category_tokens_saved["Story"], 25);
    }

    #[tokio::test]
    async fn test_report_prices_savings_and_clear_drops_prefetch() {
        let f: CacheFacade<Question> = CacheFacadeBuilder::new()
            .config(CacheConfig::new().with_pricing(ModelPricing::new("m", 0.01, 0.03)))
            .skip_restore()
            .build()
            .unwrap();
        f.stats_aggregator().record_hit("trivia", 1000);
        let report = f.report();
        assert!(report.contains("USD 0.0200"), "{report}");
        assert!(report.contains("last updated"), "{report}");

        let context = vec!["start".to_string()];
        let key = f.prefetch_cache().generate_key(&context, "a");
        f.prefetch_cache()
            .try_begin(&key)
            .unwrap()
            .complete(Generation::new("b", TokenUsage::new(1, 1)));
        f.clear();
        assert!(f.prefetch_cache().is_empty());
        assert_eq!(f.stats().total_hits, 1);
    }
}
