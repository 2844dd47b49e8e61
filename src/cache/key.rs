//! Cache key generation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }
    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Builds dedup keys from `(request text, persona, feature type)`.
///
/// Each field is trimmed and inner whitespace runs collapse to one space.
/// Case is preserved. The optional salt namespaces keys, e.g. by prompt
/// template version, so a template change never serves stale answers.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self { salt: None }
    }
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn generate(&self, request_text: &str, persona: &str, feature_type: &str) -> CacheKey {
        let mut parts: BTreeMap<&str, Value> = BTreeMap::new();
        parts.insert("text", normalize(request_text).into());
        parts.insert("persona", normalize(persona).into());
        parts.insert("feature", normalize(feature_type).into());
        self.digest(parts)
    }

    /// Key for the continuation that follows `context` when `choice` is picked.
    ///
    /// Context entries stay separate, so `["ab", "c"]` and `["a", "bc"]` differ.
    pub fn generate_continuation(&self, context: &[String], choice: &str) -> CacheKey {
        let mut parts: BTreeMap<&str, Value> = BTreeMap::new();
        parts.insert(
            "context",
            context.iter().map(|c| normalize(c)).collect::<Vec<_>>().into(),
        );
        parts.insert("choice", normalize(choice).into());
        self.digest(parts)
    }

    fn digest(&self, mut parts: BTreeMap<&str, Value>) -> CacheKey {
        if let Some(ref s) = self.salt {
            parts.insert("salt", s.clone().into());
        }
        // JSON quoting keeps field boundaries unambiguous.
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        CacheKey::new(hash)
    }
}

fn normalize(field: &str) -> String {
    field.split_whitespace().collect::<Vec<_>>().join(" ")
}
