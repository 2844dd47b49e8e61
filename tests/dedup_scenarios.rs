mod common;

use ai_gen_cache::prelude::*;
use ai_gen_cache::{Error, Result};
use async_trait::async_trait;
use common::TriviaQuestion;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct CountingGenerator {
    calls: AtomicUsize,
}

impl CountingGenerator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Generator for CountingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Generation::new(
            format!("answer #{n} to {}", request.text),
            TokenUsage::new(40, 60),
        ))
    }
}

fn facade() -> CacheFacade<TriviaQuestion> {
    CacheFacade::new(CacheConfig::default()).unwrap()
}

#[tokio::test]
async fn test_hello_twice_generates_once() {
    let cache = facade();
    let generator = CountingGenerator::new();
    let request = GenerationRequest::new("hello", "", "");

    let first = cache.respond(&request, &generator).await.unwrap();
    let second = cache.respond(&request, &generator).await.unwrap();

    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.content, second.content);
    assert_eq!(first.usage.total(), 100);
    assert!(second.cache_hit);
    assert_eq!(second.usage, TokenUsage::default());
    assert_eq!(cache.stats().dedup_tokens_saved, 100);
}

#[tokio::test]
async fn test_different_persona_is_a_different_request() {
    let cache = facade();
    let generator = CountingGenerator::new();
    cache
        .respond(&GenerationRequest::new("hello", "pirate", "chat"), &generator)
        .await
        .unwrap();
    let other = cache
        .respond(&GenerationRequest::new("hello", "robot", "chat"), &generator)
        .await
        .unwrap();
    assert!(!other.cache_hit);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_entry_expires_after_ttl() {
    let cache: CacheFacade<TriviaQuestion> =
        CacheFacade::new(CacheConfig::new().with_dedup_ttl_secs(300)).unwrap();
    let generator = CountingGenerator::new();
    let request = GenerationRequest::new("define entropy", "scientist", "explain");

    cache.respond(&request, &generator).await.unwrap();
    tokio::time::advance(Duration::from_secs(299)).await;
    assert!(cache.respond(&request, &generator).await.unwrap().cache_hit);

    tokio::time::advance(Duration::from_secs(2)).await;
    let after = cache.respond(&request, &generator).await.unwrap();
    assert!(!after.cache_hit);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_generation_is_not_cached() {
    let cache = facade();
    let key = cache.dedup().generate_key("flaky", "", "");
    let result = cache
        .get_or_generate(&key, || async { Err(Error::generation("timeout")) })
        .await;
    assert!(matches!(result, Err(Error::Generation { .. })));
    assert!(cache.dedup().get(&key).is_none());
    assert_eq!(cache.stats().dedup_misses, 1);
}

#[tokio::test]
async fn test_salted_keys_do_not_collide() {
    let plain = facade();
    let salted: CacheFacade<TriviaQuestion> =
        CacheFacade::new(CacheConfig::new().with_key_salt("prompt-v2")).unwrap();
    assert_ne!(
        plain.dedup().generate_key("a", "b", "c"),
        salted.dedup().generate_key("a", "b", "c")
    );
}
