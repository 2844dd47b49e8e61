//! Short-TTL exact-match cache for single-shot generations.

use super::key::{CacheKey, CacheKeyGenerator};
use crate::generation::Generation;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_SOFT_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Generation,
    created_at: Instant,
}

impl CacheEntry {
    fn new(payload: Generation) -> Self {
        Self {
            payload,
            created_at: Instant::now(),
        }
    }
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Exact-match dedup cache.
///
/// Entries expire lazily on read. Once the map grows past the soft capacity,
/// every `set` sweeps expired entries, so the map stays bounded by the number
/// of distinct requests seen within one TTL window.
pub struct DedupCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    soft_capacity: usize,
    keys: CacheKeyGenerator,
}

impl DedupCache {
    pub fn new(ttl: Duration, soft_capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            soft_capacity,
            keys: CacheKeyGenerator::new(),
        }
    }

    pub fn with_key_generator(mut self, keys: CacheKeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn generate_key(&self, request_text: &str, persona: &str, feature_type: &str) -> CacheKey {
        self.keys.generate(request_text, persona, feature_type)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Generation> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(self.ttl) => return Some(entry.payload.clone()),
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check: a writer may have refreshed the entry between the two locks.
        if entries.get(key).is_some_and(|e| e.is_expired(self.ttl)) {
            entries.remove(key);
            debug!(key = %key, "dedup entry expired");
            return None;
        }
        entries.get(key).map(|e| e.payload.clone())
    }

    pub fn set(&self, key: CacheKey, value: Generation) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, CacheEntry::new(value));
        if entries.len() > self.soft_capacity {
            let before = entries.len();
            let ttl = self.ttl;
            entries.retain(|_, e| !e.is_expired(ttl));
            debug!(
                removed = before - entries.len(),
                remaining = entries.len(),
                "dedup sweep"
            );
        }
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, e| !e.is_expired(ttl));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| !e.is_expired(self.ttl))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn stored(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_TTL, DEFAULT_SOFT_CAPACITY)
    }
}
