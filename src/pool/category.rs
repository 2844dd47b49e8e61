//! Single-category pool storage.

use super::item::{ItemId, PoolItem};
use super::profile::PoolProfile;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::watch;

/// What a fill did to the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillOutcome {
    pub added: usize,
    /// Items skipped because their id or dedup key was already present.
    pub duplicates: usize,
    /// Oldest items dropped to respect the ceiling.
    pub discarded: usize,
}

/// Read-only view of one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub key: String,
    pub len: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub refill_in_flight: bool,
}

/// Items are kept oldest first.
#[derive(Debug)]
pub(crate) struct Pool<T> {
    items: Vec<T>,
    profile: PoolProfile,
    /// Whether a fetch for this pool is running. Waiters subscribe to it.
    in_flight: watch::Sender<bool>,
}

impl<T: PoolItem> Pool<T> {
    pub(crate) fn new(profile: PoolProfile) -> Self {
        Self {
            items: Vec::new(),
            profile,
            in_flight: watch::channel(false).0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn profile(&self) -> &PoolProfile {
        &self.profile
    }

    pub(crate) fn needs_refill(&self) -> bool {
        self.items.len() < self.profile.min_size
    }

    pub(crate) fn refill_in_flight(&self) -> bool {
        *self.in_flight.borrow()
    }

    pub(crate) fn set_refill_in_flight(&mut self, in_flight: bool) {
        self.in_flight.send_replace(in_flight);
    }

    pub(crate) fn subscribe_in_flight(&self) -> watch::Receiver<bool> {
        self.in_flight.subscribe()
    }

    /// Remove `n` items picked uniformly at random, or nothing if fewer are held.
    pub(crate) fn draw<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> Option<Vec<T>> {
        if self.items.len() < n {
            return None;
        }
        let picks = index::sample(rng, self.items.len(), n).into_vec();
        let mut slots: Vec<Option<T>> = self.items.drain(..).map(Some).collect();
        let drawn: Vec<T> = picks.iter().filter_map(|&i| slots[i].take()).collect();
        self.items = slots.into_iter().flatten().collect();
        Some(drawn)
    }

    /// Like `draw`, but hands out whatever is available when short.
    pub(crate) fn take_up_to<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> Vec<T> {
        let n = n.min(self.items.len());
        self.draw(n, rng).unwrap_or_default()
    }

    pub(crate) fn fill(&mut self, new_items: Vec<T>) -> FillOutcome {
        let mut ids: HashSet<ItemId> = self.items.iter().map(PoolItem::item_id).collect();
        let mut dedup_keys: HashSet<String> =
            self.items.iter().filter_map(PoolItem::dedup_key).collect();
        let mut outcome = FillOutcome::default();

        for item in new_items {
            if !ids.insert(item.item_id()) {
                outcome.duplicates += 1;
                continue;
            }
            if let Some(k) = item.dedup_key() {
                if !dedup_keys.insert(k) {
                    outcome.duplicates += 1;
                    continue;
                }
            }
            self.items.push(item);
            outcome.added += 1;
        }

        if self.items.len() > self.profile.max_size {
            let surplus = self.items.len() - self.profile.max_size;
            self.items.drain(..surplus);
            outcome.discarded = surplus;
        }
        outcome
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    pub(crate) fn status(&self, key: &str) -> PoolStatus {
        PoolStatus {
            key: key.to_string(),
            len: self.items.len(),
            min_size: self.profile.min_size,
            max_size: self.profile.max_size,
            refill_in_flight: self.refill_in_flight(),
        }
    }

    #[cfg(test)]
    pub(crate) fn items(&self) -> &[T] {
        &self.items
    }
}
