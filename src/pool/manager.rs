//! Per-category pool manager.

use super::category::{FillOutcome, Pool, PoolStatus};
use super::item::PoolItem;
use super::profile::{PoolProfile, PoolProfiles};
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::debug;

type SharedPool<T> = Arc<Mutex<Pool<T>>>;

fn lock<T>(pool: &Mutex<T>) -> MutexGuard<'_, T> {
    pool.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns one independently locked pool per category key.
///
/// The key map lock is held only to find or create a pool; all item
/// operations lock that single pool, so categories never contend.
pub struct ContentPoolManager<T: PoolItem> {
    pools: RwLock<HashMap<String, SharedPool<T>>>,
    profiles: PoolProfiles,
}

impl<T: PoolItem> ContentPoolManager<T> {
    pub fn new(profiles: PoolProfiles) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            profiles,
        }
    }

    fn existing(&self, key: &str) -> Option<SharedPool<T>> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn pool(&self, key: &str) -> SharedPool<T> {
        if let Some(p) = self.existing(key) {
            return p;
        }
        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        pools
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(category = key, "creating pool");
                Arc::new(Mutex::new(Pool::new(self.profiles.resolve(key).clone())))
            })
            .clone()
    }

    pub fn profile(&self, key: &str) -> PoolProfile {
        match self.existing(key) {
            Some(p) => lock(&p).profile().clone(),
            None => self.profiles.resolve(key).clone(),
        }
    }

    /// Atomically remove `count` randomly chosen items.
    ///
    /// Returns `Ok(None)` on a miss (fewer than `count` held). Asking for more
    /// than the pool ceiling can never succeed and is rejected.
    pub fn draw(&self, key: &str, count: usize) -> Result<Option<Vec<T>>> {
        let pool = self.pool(key);
        let mut pool = lock(&pool);
        let max = pool.profile().max_size;
        if count > max {
            return Err(Error::validation_with_context(
                "draw count exceeds pool ceiling",
                ErrorContext::new()
                    .with_field_path("count")
                    .with_details(format!("count = {}, max_size = {}", count, max))
                    .with_source("pool_manager"),
            ));
        }
        Ok(pool.draw(count, &mut rand::thread_rng()))
    }

    /// Remove up to `count` items, returning fewer when the pool is short.
    pub fn take_up_to(&self, key: &str, count: usize) -> Vec<T> {
        match self.existing(key) {
            Some(p) => lock(&p).take_up_to(count, &mut rand::thread_rng()),
            None => Vec::new(),
        }
    }

    pub fn fill(&self, key: &str, items: Vec<T>) -> FillOutcome {
        let pool = self.pool(key);
        let outcome = lock(&pool).fill(items);
        debug!(
            category = key,
            added = outcome.added,
            duplicates = outcome.duplicates,
            discarded = outcome.discarded,
            "pool filled"
        );
        outcome
    }

    /// True when the pool holds fewer than its low-water mark. Unseen keys need a refill.
    pub fn needs_refill(&self, key: &str) -> bool {
        match self.existing(key) {
            Some(p) => lock(&p).needs_refill(),
            None => self.profiles.resolve(key).min_size > 0,
        }
    }

    /// Claim the refill slot for `key` if the pool is low and no refill is running.
    ///
    /// The returned guard releases the slot when dropped, whether or not the
    /// refill produced anything.
    pub fn try_begin_refill(&self, key: &str) -> Option<RefillGuard<T>> {
        self.claim(key, true)
    }

    /// Claim the fetch slot for `key` whenever no fetch is running, low or not.
    ///
    /// Used by a miss that must generate before it can be served.
    pub fn try_begin_fetch(&self, key: &str) -> Option<RefillGuard<T>> {
        self.claim(key, false)
    }

    fn claim(&self, key: &str, only_when_low: bool) -> Option<RefillGuard<T>> {
        let shared = self.pool(key);
        let mut pool = lock(&shared);
        if pool.refill_in_flight() || (only_when_low && !pool.needs_refill()) {
            return None;
        }
        pool.set_refill_in_flight(true);
        let batch_size = pool.profile().fetch_batch_size;
        drop(pool);
        Some(RefillGuard {
            key: key.to_string(),
            batch_size,
            pool: shared,
        })
    }

    /// Wait until the fetch running for `key`, if any, has finished.
    ///
    /// Returns immediately when none is running.
    pub async fn wait_for_refill(&self, key: &str) {
        let Some(shared) = self.existing(key) else {
            return;
        };
        let mut rx = {
            let pool = lock(&shared);
            if !pool.refill_in_flight() {
                return;
            }
            pool.subscribe_in_flight()
        };
        // The sender lives in the pool, which `shared` keeps alive.
        let _ = rx.wait_for(|in_flight| !*in_flight).await;
    }

    pub fn is_refilling(&self, key: &str) -> bool {
        self.existing(key)
            .map(|p| lock(&p).refill_in_flight())
            .unwrap_or(false)
    }

    pub fn len(&self, key: &str) -> usize {
        self.existing(key).map(|p| lock(&p).len()).unwrap_or(0)
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    pub fn status(&self, key: &str) -> PoolStatus {
        match self.existing(key) {
            Some(p) => lock(&p).status(key),
            None => {
                let profile = self.profiles.resolve(key);
                PoolStatus {
                    key: key.to_string(),
                    len: 0,
                    min_size: profile.min_size,
                    max_size: profile.max_size,
                    refill_in_flight: false,
                }
            }
        }
    }

    /// Status of every known pool, sorted by key.
    pub fn statuses(&self) -> Vec<PoolStatus> {
        let pools: Vec<(String, SharedPool<T>)> = self
            .pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, p)| (k.clone(), Arc::clone(p)))
            .collect();
        let mut out: Vec<PoolStatus> = pools.iter().map(|(k, p)| lock(p).status(k)).collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    /// Drop the items of one pool. An in-flight refill still completes into it.
    pub fn clear(&self, key: &str) {
        if let Some(p) = self.existing(key) {
            lock(&p).clear();
        }
    }

    pub fn clear_all(&self) {
        let pools: Vec<SharedPool<T>> = self
            .pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for p in pools {
            lock(&p).clear();
        }
    }
}

impl<T: PoolItem> Default for ContentPoolManager<T> {
    fn default() -> Self {
        Self::new(PoolProfiles::default())
    }
}

/// Exclusive right to refill one pool.
pub struct RefillGuard<T: PoolItem> {
    key: String,
    batch_size: usize,
    pool: SharedPool<T>,
}

impl<T: PoolItem> RefillGuard<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Fill the pool with the refill result and release the slot.
    pub fn complete(self, items: Vec<T>) -> FillOutcome {
        let outcome = lock(&self.pool).fill(items);
        debug!(
            category = %self.key,
            added = outcome.added,
            duplicates = outcome.duplicates,
            "refill completed"
        );
        outcome
    }

    /// Fill the pool, then take up to `count` items before the slot is released.
    ///
    /// Callers waiting on the slot only see what is left after this take.
    pub fn complete_and_take(self, items: Vec<T>, count: usize) -> (FillOutcome, Vec<T>) {
        let mut pool = lock(&self.pool);
        let outcome = pool.fill(items);
        let taken = pool.take_up_to(count, &mut rand::thread_rng());
        drop(pool);
        debug!(
            category = %self.key,
            added = outcome.added,
            taken = taken.len(),
            "fetch completed"
        );
        (outcome, taken)
    }
}

impl<T: PoolItem> Drop for RefillGuard<T> {
    fn drop(&mut self) {
        lock(&self.pool).set_refill_in_flight(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::category::tests::{words, Word};
    use crate::pool::ItemId;
    use std::collections::HashSet;

    fn manager() -> ContentPoolManager<Word> {
        ContentPoolManager::new(
            PoolProfiles::new(PoolProfile::small()).with_override("vocab", PoolProfile::vocabulary()),
        )
    }

    #[test]
    fn test_unseen_key_misses() {
        let m = manager();
        assert!(m.draw("trivia|easy", 5).unwrap().is_none());
        assert!(m.needs_refill("trivia|easy"));
    }

    #[test]
    fn test_fill_then_draw() {
        let m = manager();
        m.fill("trivia|easy", words("q", 20));
        let drawn = m.draw("trivia|easy", 5).unwrap().unwrap();
        let ids: HashSet<ItemId> = drawn.iter().map(|w| w.id).collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(m.len("trivia|easy"), 15);
    }

    #[test]
    fn test_draw_over_ceiling_rejected() {
        let m = manager();
        let err = m.draw("trivia|easy", 101).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        // Vocabulary pools have a higher ceiling.
        assert!(m.draw("vocab|es|a1", 101).unwrap().is_none());
    }

    #[test]
    fn test_zero_count_is_empty_hit() {
        let m = manager();
        assert_eq!(m.draw("trivia|easy", 0).unwrap().map(|v| v.len()), Some(0));
    }

    #[test]
    fn test_pools_are_independent() {
        let m = manager();
        m.fill("a", words("a", 10));
        m.fill("b", words("b", 3));
        m.draw("a", 10).unwrap().unwrap();
        assert_eq!(m.len("a"), 0);
        assert_eq!(m.len("b"), 3);
    }

    #[test]
    fn test_refill_slot_is_exclusive() {
        let m = manager();
        m.fill("k", words("w", 4)); // below min_size of 5
        let guard = m.try_begin_refill("k").expect("low pool should be claimable");
        assert!(m.is_refilling("k"));
        assert!(m.try_begin_refill("k").is_none());
        assert_eq!(guard.batch_size(), 20);
        let outcome = guard.complete(words("n", 20));
        assert_eq!(outcome.added, 20);
        assert!(!m.is_refilling("k"));
        assert_eq!(m.len("k"), 24);
    }

    #[test]
    fn test_dropped_guard_releases_slot() {
        let m = manager();
        let guard = m.try_begin_refill("k").unwrap();
        drop(guard);
        assert!(!m.is_refilling("k"));
        assert!(m.try_begin_refill("k").is_some());
    }

    #[test]
    fn test_fetch_slot_claimable_on_healthy_pool() {
        let m = manager();
        m.fill("k", words("w", 30));
        let guard = m.try_begin_fetch("k").expect("idle pool should be claimable");
        assert!(m.try_begin_fetch("k").is_none());
        assert!(m.try_begin_refill("k").is_none());
        let (outcome, taken) = guard.complete_and_take(words("n", 5), 8);
        assert_eq!(outcome.added, 5);
        assert_eq!(taken.len(), 8);
        assert_eq!(m.len("k"), 27);
        assert!(!m.is_refilling("k"));
    }

    #[tokio::test]
    async fn test_wait_for_refill_returns_when_slot_released() {
        let m = Arc::new(manager());
        m.wait_for_refill("unseen").await;

        let guard = m.try_begin_refill("k").unwrap();
        let waiter = {
            let m = Arc::clone(&m);
            tokio::spawn(async move {
                m.wait_for_refill("k").await;
                m.len("k")
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        guard.complete(words("n", 6));
        assert_eq!(waiter.await.unwrap(), 6);
    }

    #[test]
    fn test_full_pool_not_claimable() {
        let m = manager();
        m.fill("k", words("w", 30));
        assert!(m.try_begin_refill("k").is_none());
    }

    #[test]
    fn test_statuses_sorted() {
        let m = manager();
        m.fill("b", words("b", 2));
        m.fill("a", words("a", 7));
        let statuses = m.statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].key, "a");
        assert_eq!(statuses[0].len, 7);
        assert_eq!(statuses[1].min_size, 5);
        assert_eq!(m.status("unseen").len, 0);
    }

    #[test]
    fn test_clear_keeps_refill_flag() {
        let m = manager();
        m.fill("k", words("w", 2));
        let guard = m.try_begin_refill("k").unwrap();
        m.clear_all();
        assert_eq!(m.len("k"), 0);
        assert!(m.is_refilling("k"));
        guard.complete(words("n", 3));
        assert_eq!(m.len("k"), 3);
    }

    #[test]
    fn test_concurrent_draws_never_share_items() {
        let m = Arc::new(manager());
        m.fill("vocab|de", words("w", 400));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    let mut got = Vec::new();
                    for _ in 0..10 {
                        if let Some(items) = m.draw("vocab|de", 5).unwrap() {
                            got.extend(items.into_iter().map(|w| w.id));
                        }
                    }
                    got
                })
            })
            .collect();
        let mut seen = HashSet::new();
        let mut total = 0;
        for h in handles {
            for id in h.join().unwrap() {
                total += 1;
                assert!(seen.insert(id), "item dispensed twice");
            }
        }
        assert_eq!(total, 400);
        assert_eq!(m.len("vocab|de"), 0);
    }
}
