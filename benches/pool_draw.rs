//! Benchmarks for the cache hot paths
//!
//! This benchmark measures:
//! - Dedup key derivation for short and long prompts
//! - Random draws from a warm pool
//! - The facade hit path, including stats recording

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ai_gen_cache::cache::CacheKeyGenerator;
use ai_gen_cache::prelude::*;
use ai_gen_cache::ContentPoolManager;
use std::sync::Arc;

#[derive(Clone)]
struct Word {
    id: ItemId,
    text: String,
}

impl PoolItem for Word {
    fn item_id(&self) -> ItemId {
        self.id
    }
    fn dedup_key(&self) -> Option<String> {
        Some(self.text.to_lowercase())
    }
}

fn words(prefix: &str, n: usize) -> Vec<Word> {
    (0..n)
        .map(|i| Word {
            id: ItemId::new(),
            text: format!("{prefix}-{i}"),
        })
        .collect()
}

fn bench_key_generation(c: &mut Criterion) {
    let keys = CacheKeyGenerator::new();
    let mut group = c.benchmark_group("key_generation");

    let short = "What is the capital of France?".to_string();
    let long = "Explain the difference between a verb and an adverb. ".repeat(40);

    for (name, text) in [("short", &short), ("long", &long)] {
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("generate", name), text, |b, text| {
            b.iter(|| keys.generate(black_box(text), "tutor", "explain"))
        });
    }

    group.finish();
}

fn bench_pool_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_draw");

    for count in [1usize, 5, 20] {
        group.bench_with_input(BenchmarkId::new("draw", count), &count, |b, &count| {
            let pools: ContentPoolManager<Word> =
                ContentPoolManager::new(CacheConfig::default().pool_profiles());
            b.iter(|| {
                if pools.len("vocab") < count {
                    pools.fill("vocab", words("w", 100));
                }
                pools.draw("vocab", black_box(count)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_facade_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache: CacheFacade<Word> = CacheFacadeBuilder::new()
        .config(CacheConfig::new().with_persist_every(0))
        .skip_restore()
        .build()
        .unwrap();
    let generator = Arc::new(|category: String, count: usize| async move {
        Ok::<_, ai_gen_cache::Error>(words(&category, count))
    });

    c.bench_function("facade_draw_hit", |b| {
        b.to_async(&rt).iter(|| async {
            if cache.pool_status("trivia").len < 50 {
                cache.pools().fill("trivia", words("t", 100));
            }
            cache
                .draw_or_generate("trivia", black_box(1), &generator)
                .await
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_key_generation, bench_pool_draw, bench_facade_hit);
criterion_main!(benches);
