//! Shared fixtures for integration tests.

#![allow(dead_code)]

use ai_gen_cache::prelude::*;
use ai_gen_cache::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct TriviaQuestion {
    pub id: ItemId,
    pub question: String,
}

impl TriviaQuestion {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            question: question.into(),
        }
    }
}

impl PoolItem for TriviaQuestion {
    fn item_id(&self) -> ItemId {
        self.id
    }
    fn dedup_key(&self) -> Option<String> {
        Some(self.question.trim().to_lowercase())
    }
}

/// Batch generator that counts calls and can be held open or made to fail.
#[derive(Default)]
pub struct ScriptedBatch {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    /// Each call waits for one permit when set.
    pub gate: Option<Semaphore>,
}

impl ScriptedBatch {
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        let s = Self::default();
        s.fail.store(true, Ordering::SeqCst);
        s
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        if let Some(ref gate) = self.gate {
            gate.add_permits(1);
        }
    }
}

#[async_trait]
impl BatchGenerator<TriviaQuestion> for ScriptedBatch {
    async fn generate_batch(&self, category: &str, count: usize) -> Result<Vec<TriviaQuestion>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref gate) = self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::generation("provider unavailable"));
        }
        Ok((0..count)
            .map(|i| TriviaQuestion::new(format!("{category} question {call}.{i}")))
            .collect())
    }
}

/// Poll `cond` until it holds or a generous deadline passes.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
