//! Warm Pools Example
//!
//! Serves trivia questions and repeated prompts through a `CacheFacade`
//! backed by a fake generator that sleeps like a slow provider.
//!
//! Shows:
//! 1. A cold miss generating a batch synchronously
//! 2. Warm hits served instantly while a background refill tops the pool up
//! 3. Repeated single-shot prompts answered from the dedup cache
//! 4. Story continuations prefetched for each offered choice
//! 5. Stats persisted to a temporary directory and restored on restart
//!
//! Run with `RUST_LOG=ai_gen_cache=debug cargo run --example warm_pools`.

use ai_gen_cache::prelude::*;
use anyhow::Context;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

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

/// Pretends to be a provider: 300ms per call.
#[derive(Default)]
struct SlowProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl BatchGenerator<Question> for SlowProvider {
    async fn generate_batch(
        &self,
        category: &str,
        count: usize,
    ) -> ai_gen_cache::Result<Vec<Question>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok((0..count)
            .map(|i| Question {
                id: ItemId::new(),
                text: format!("[{category}] question {call}.{i}"),
            })
            .collect())
    }
}

#[async_trait]
impl Generator for SlowProvider {
    async fn generate(&self, request: &GenerationRequest) -> ai_gen_cache::Result<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(Generation::new(
            format!("{} says: {}", request.persona, request.text),
            TokenUsage::new(120, 80).with_cached_tokens(64),
        )
        .with_provider("openai"))
    }
}

fn build(stats_path: &std::path::Path) -> anyhow::Result<CacheFacade<Question>> {
    let config = CacheConfig::new()
        .with_default_profile(PoolProfile::new(5, 40, 20))
        .with_pricing(ModelPricing::gpt_4o_mini())
        .with_stats_path(stats_path);
    CacheFacadeBuilder::new()
        .config(config)
        .build()
        .context("failed to build cache facade")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ai_gen_cache=info")),
        )
        .init();

    let dir = std::env::temp_dir().join(format!("warm-pools-demo-{}", std::process::id()));
    let stats_path = dir.join(ai_gen_cache::stats::STATS_FILE_NAME);
    let cache = build(&stats_path)?;
    let provider = Arc::new(SlowProvider::default());

    println!("== Content pools ==");
    for round in 1..=6 {
        let started = Instant::now();
        let items = cache.draw_or_generate("trivia|easy", 4, &provider).await?;
        let status = cache.pool_status("trivia|easy");
        println!(
            "round {round}: {} items in {:>4}ms, pool={} refilling={}",
            items.len(),
            started.elapsed().as_millis(),
            status.len,
            status.refill_in_flight
        );
    }

    // Several callers at once still start at most one refill.
    let draws = (0..8).map(|_| cache.draw_or_generate("trivia|easy", 1, &provider));
    let served: usize = futures::future::join_all(draws)
        .await
        .into_iter()
        .collect::<ai_gen_cache::Result<Vec<_>>>()?
        .iter()
        .map(Vec::len)
        .sum();
    println!("concurrent draws served {served} items");

    println!("\n== Dedup ==");
    let request = GenerationRequest::new("What is a haiku?", "poet", "explain");
    for attempt in 1..=3 {
        let started = Instant::now();
        let response = cache.respond(&request, provider.as_ref()).await?;
        println!(
            "attempt {attempt}: cache_hit={} tokens={} in {}ms",
            response.cache_hit,
            response.usage.total(),
            started.elapsed().as_millis()
        );
    }

    println!("\n== Prefetch ==");
    let story = vec!["The lantern flickers at the cave mouth.".to_string()];
    let choices = vec!["Step inside".to_string(), "Turn back".to_string()];
    let request_for = |choice: &str| GenerationRequest::new(choice, "narrator", "story");
    let started = cache.prefetch_continuations(&story, &choices, request_for, &provider);
    println!("prefetching {started} continuations");
    tokio::time::sleep(Duration::from_millis(500)).await;
    match cache.prefetched(&story, "Step inside") {
        Some(next) => println!("picked 'Step inside': {}", next.content),
        None => println!("picked 'Step inside': not ready yet"),
    }

    cache.persist_stats()?;
    println!("\n{}", cache.report());
    println!("provider calls: {}", provider.calls.load(Ordering::SeqCst));

    drop(cache);
    let restarted = build(&stats_path)?;
    println!(
        "\nafter restart: {} hits restored, pools empty: {}",
        restarted.stats().total_hits,
        restarted.pool_statuses().is_empty()
    );

    std::fs::remove_dir_all(&dir).with_context(|| format!("failed to clean up {}", dir.display()))?;
    Ok(())
}
