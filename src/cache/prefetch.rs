//! Speculative prefetch of likely next generations.
//!
//! When a user is shown a set of choices, the continuation for each choice
//! can be generated before one is picked. Entries are keyed by
//! `(context, choice)`; a key that is already stored or being fetched is
//! never fetched twice.

use super::key::{CacheKey, CacheKeyGenerator};
use crate::generation::Generation;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_PREFETCH_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
struct Prefetched {
    generation: Generation,
    generated_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    ready: HashMap<CacheKey, Prefetched>,
    pending: HashSet<CacheKey>,
}

/// Bounded store of prefetched generations plus the set of fetches in flight.
///
/// Growing past the capacity evicts the oldest half of the stored entries.
#[derive(Debug)]
pub struct PrefetchCache {
    state: Arc<Mutex<State>>,
    capacity: usize,
    keys: CacheKeyGenerator,
}

impl PrefetchCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            capacity,
            keys: CacheKeyGenerator::new(),
        }
    }

    pub fn with_key_generator(mut self, keys: CacheKeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn generate_key(&self, context: &[String], choice: &str) -> CacheKey {
        self.keys.generate_continuation(context, choice)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `key` for fetching. `None` if it is already stored or pending.
    pub fn try_begin(&self, key: &CacheKey) -> Option<PrefetchSlot> {
        let mut st = self.state();
        if st.ready.contains_key(key) || !st.pending.insert(key.clone()) {
            return None;
        }
        Some(PrefetchSlot {
            key: key.clone(),
            state: Arc::clone(&self.state),
            capacity: self.capacity,
        })
    }

    pub fn get(&self, key: &CacheKey) -> Option<Generation> {
        self.state().ready.get(key).map(|p| p.generation.clone())
    }

    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.state().pending.contains(key)
    }

    /// Stored entries, not counting pending fetches.
    pub fn len(&self) -> usize {
        self.state().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop stored entries and forget pending keys.
    ///
    /// A fetch still running after a clear stores its result when it lands.
    pub fn clear(&self) {
        let mut st = self.state();
        st.ready.clear();
        st.pending.clear();
    }
}

impl Default for PrefetchCache {
    fn default() -> Self {
        Self::new(DEFAULT_PREFETCH_CAPACITY)
    }
}

/// Exclusive right to fetch one prefetch key. Dropping it abandons the fetch.
#[derive(Debug)]
pub struct PrefetchSlot {
    key: CacheKey,
    state: Arc<Mutex<State>>,
    capacity: usize,
}

impl PrefetchSlot {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Store the fetched generation, evicting the oldest half when over capacity.
    pub fn complete(self, generation: Generation) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.ready.insert(
            self.key.clone(),
            Prefetched {
                generation,
                generated_at: Instant::now(),
            },
        );
        if st.ready.len() > self.capacity {
            let mut by_age: Vec<(Instant, CacheKey)> = st
                .ready
                .iter()
                .map(|(k, p)| (p.generated_at, k.clone()))
                .collect();
            by_age.sort_by_key(|(at, _)| *at);
            let evict = (self.capacity / 2).max(1);
            for (_, k) in by_age.into_iter().take(evict) {
                st.ready.remove(&k);
            }
            debug!(evicted = evict, remaining = st.ready.len(), "prefetch eviction");
        }
    }
}

impl Drop for PrefetchSlot {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .remove(&self.key);
    }
}
