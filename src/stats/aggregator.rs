//! Cumulative cache statistics.

use super::store::StatsStore;
use crate::tokens::{CostEstimate, ModelPricing};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

pub const DEFAULT_PERSIST_EVERY: u64 = 10;

/// Snapshot of every counter. This is also the persisted JSON shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheStats {
    pub total_hits: u64,
    pub total_misses: u64,
    pub tokens_saved: u64,
    pub category_hits: BTreeMap<String, u64>,
    pub category_misses: BTreeMap<String, u64>,
    pub category_tokens_saved: BTreeMap<String, u64>,
    pub dedup_hits: u64,
    pub dedup_misses: u64,
    pub dedup_tokens_saved: u64,
    pub provider_cache_hits: BTreeMap<String, u64>,
    pub provider_tokens_cached: BTreeMap<String, u64>,
    pub refills_completed: u64,
    pub refill_failures: u64,
    /// Time of the most recent recorded event. `None` until the first one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl CacheStats {
    pub fn total_requests(&self) -> u64 {
        self.total_hits + self.total_misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.total_hits as f64 / total as f64
        }
    }

    pub fn category_hit_rate(&self, category: &str) -> f64 {
        let hits = self.category_hits.get(category).copied().unwrap_or(0);
        let misses = self.category_misses.get(category).copied().unwrap_or(0);
        if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        }
    }

    /// Money not spent thanks to the cache, priced at the blended model rate.
    pub fn estimated_cost_saved(&self, pricing: &ModelPricing) -> CostEstimate {
        pricing.blended_cost(self.tokens_saved)
    }

    /// Multi-line report, with savings priced by `pricing`.
    pub fn summary(&self, pricing: &ModelPricing) -> String {
        let mut out = format!(
            "hits {} / misses {} ({:.1}% hit rate), {} tokens saved, estimated savings {}",
            self.total_hits,
            self.total_misses,
            self.hit_rate() * 100.0,
            self.tokens_saved,
            self.estimated_cost_saved(pricing).format(),
        );
        out.push_str(&format!(
            "\n  dedup: {} hits, {} tokens saved",
            self.dedup_hits, self.dedup_tokens_saved
        ));
        for (category, hits) in &self.category_hits {
            out.push_str(&format!(
                "\n  {}: {} hits, {} misses, {} tokens saved",
                category,
                hits,
                self.category_misses.get(category).copied().unwrap_or(0),
                self.category_tokens_saved.get(category).copied().unwrap_or(0),
            ));
        }
        for (category, misses) in &self.category_misses {
            if !self.category_hits.contains_key(category) {
                out.push_str(&format!("\n  {}: 0 hits, {} misses", category, misses));
            }
        }
        for (provider, hits) in &self.provider_cache_hits {
            out.push_str(&format!(
                "\n  provider {}: {} native cache hits, {} tokens cached",
                provider,
                hits,
                self.provider_tokens_cached.get(provider).copied().unwrap_or(0),
            ));
        }
        match self.last_updated {
            Some(at) => out.push_str(&format!("\nlast updated {}", at.format("%Y-%m-%d %H:%M:%S UTC"))),
            None => out.push_str("\nlast updated never"),
        }
        out
    }
}

/// What `restore` found in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    /// Nothing saved yet.
    Missing,
    /// The blob could not be parsed; stats start from zero.
    Corrupt,
    /// The store failed to read; stats start from zero.
    Unavailable,
    /// No store configured.
    Disabled,
}

#[derive(Default)]
struct State {
    stats: CacheStats,
    /// Bumped on every mutation so stale snapshots never overwrite newer ones.
    version: u64,
    hits_since_persist: u64,
}

struct Persister {
    store: Arc<dyn StatsStore>,
    written: Mutex<Option<u64>>,
}

impl Persister {
    fn write(&self, version: u64, stats: &CacheStats) -> Result<()> {
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if written.is_some_and(|w| w >= version) {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(stats)?;
        self.store.save(&bytes)?;
        *written = Some(version);
        Ok(())
    }
}

/// Thread-safe counters with debounced persistence.
///
/// Recording never fails and never waits on disk: every `persist_every`-th
/// hit schedules a write on tokio's blocking pool (or writes inline when no
/// runtime is running).
pub struct StatsAggregator {
    state: Mutex<State>,
    persister: Option<Arc<Persister>>,
    persist_every: u64,
}

impl StatsAggregator {
    pub fn new(store: Option<Arc<dyn StatsStore>>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            persister: store.map(|store| {
                Arc::new(Persister {
                    store,
                    written: Mutex::new(None),
                })
            }),
            persist_every: DEFAULT_PERSIST_EVERY,
        }
    }

    /// Counters only, nothing is ever written.
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Persist after every `n` hits. `0` disables auto-persist.
    pub fn with_persist_every(mut self, n: u64) -> Self {
        self.persist_every = n;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a mutation; `is_hit` advances the auto-persist counter.
    fn update(&self, is_hit: bool, f: impl FnOnce(&mut CacheStats)) {
        let due = {
            let mut st = self.state();
            f(&mut st.stats);
            st.stats.last_updated = Some(Utc::now());
            st.version += 1;
            if is_hit {
                st.hits_since_persist += 1;
            }
            if self.persist_every > 0 && st.hits_since_persist >= self.persist_every {
                st.hits_since_persist = 0;
                Some((st.version, st.stats.clone()))
            } else {
                None
            }
        };
        if let Some((version, stats)) = due {
            self.schedule_persist(version, stats);
        }
    }

    fn schedule_persist(&self, version: u64, stats: CacheStats) {
        let Some(persister) = self.persister.as_ref().map(Arc::clone) else {
            return;
        };
        let write = move || {
            if let Err(e) = persister.write(version, &stats) {
                warn!(error = %e, store = persister.store.name(), "failed to persist cache stats");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }

    pub fn record_hit(&self, category: &str, tokens_saved: u64) {
        self.update(true, |s| {
            s.total_hits += 1;
            s.tokens_saved += tokens_saved;
            *s.category_hits.entry(category.to_string()).or_default() += 1;
            *s.category_tokens_saved
                .entry(category.to_string())
                .or_default() += tokens_saved;
        });
    }

    pub fn record_miss(&self, category: &str) {
        self.update(false, |s| {
            s.total_misses += 1;
            *s.category_misses.entry(category.to_string()).or_default() += 1;
        });
    }

    pub fn record_dedup_hit(&self, tokens_saved: u64) {
        self.update(true, |s| {
            s.total_hits += 1;
            s.tokens_saved += tokens_saved;
            s.dedup_hits += 1;
            s.dedup_tokens_saved += tokens_saved;
        });
    }

    pub fn record_dedup_miss(&self) {
        self.update(false, |s| {
            s.total_misses += 1;
            s.dedup_misses += 1;
        });
    }

    pub fn record_provider_native_cache_hit(&self, provider: &str, tokens_cached: u64) {
        self.update(true, |s| {
            *s.provider_cache_hits.entry(provider.to_string()).or_default() += 1;
            *s.provider_tokens_cached
                .entry(provider.to_string())
                .or_default() += tokens_cached;
        });
    }

    /// Outcome of a background pool refill.
    pub fn record_refill(&self, succeeded: bool) {
        self.update(false, |s| {
            if succeeded {
                s.refills_completed += 1;
            } else {
                s.refill_failures += 1;
            }
        });
    }

    pub fn snapshot(&self) -> CacheStats {
        self.state().stats.clone()
    }

    /// Write the current counters now. A no-op without a store.
    pub fn persist(&self) -> Result<()> {
        let Some(persister) = self.persister.as_ref() else {
            return Ok(());
        };
        let (version, stats) = {
            let mut st = self.state();
            st.hits_since_persist = 0;
            (st.version, st.stats.clone())
        };
        persister.write(version, &stats)?;
        debug!(version, "cache stats persisted");
        Ok(())
    }

    /// Load counters from the store, replacing the in-memory ones.
    ///
    /// Never fails: a missing, unreadable or corrupt blob leaves zeroed stats.
    pub fn restore(&self) -> RestoreOutcome {
        let Some(persister) = self.persister.as_ref() else {
            return RestoreOutcome::Disabled;
        };
        let (stats, outcome) = match persister.store.load() {
            Ok(Some(bytes)) => match serde_json::from_slice::<CacheStats>(&bytes) {
                Ok(stats) => (stats, RestoreOutcome::Restored),
                Err(e) => {
                    warn!(error = %e, "cache stats snapshot is corrupt, starting from zero");
                    (CacheStats::default(), RestoreOutcome::Corrupt)
                }
            },
            Ok(None) => (CacheStats::default(), RestoreOutcome::Missing),
            Err(e) => {
                warn!(error = %e, store = persister.store.name(), "could not read cache stats, starting from zero");
                (CacheStats::default(), RestoreOutcome::Unavailable)
            }
        };
        let mut st = self.state();
        st.stats = stats;
        st.version += 1;
        st.hits_since_persist = 0;
        if outcome == RestoreOutcome::Restored {
            info!(
                hits = st.stats.total_hits,
                misses = st.stats.total_misses,
                "cache stats restored"
            );
        }
        outcome
    }

    /// Zero every counter and persist the empty state.
    pub fn reset(&self) -> Result<()> {
        {
            let mut st = self.state();
            st.stats = CacheStats::default();
            st.version += 1;
            st.hits_since_persist = 0;
        }
        self.persist()
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::in_memory()
    }
}
