//! Pool item identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of one generated item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ItemId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pre-generated content unit that can live in a pool.
///
/// Domain types (trivia questions, vocabulary words, ...) implement this.
pub trait PoolItem: Clone + Send + Sync + 'static {
    fn item_id(&self) -> ItemId;

    /// Natural de-dup key, e.g. the normalized question text.
    ///
    /// Items sharing a key are treated as the same content during fill.
    fn dedup_key(&self) -> Option<String> {
        None
    }
}
