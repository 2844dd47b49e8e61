//! Pool sizing profiles.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sizing and cost parameters for one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolProfile {
    /// Low-water mark. A pool with fewer items asks for a refill.
    pub min_size: usize,
    /// Ceiling. Fills beyond it discard the oldest items.
    pub max_size: usize,
    /// Items requested from the batch generator per refill.
    pub fetch_batch_size: usize,
    /// Average generation cost of one item, used to estimate tokens saved on a hit.
    #[serde(default = "default_tokens_per_item")]
    pub tokens_per_item: u64,
}

fn default_tokens_per_item() -> u64 {
    60
}

impl PoolProfile {
    pub fn new(min_size: usize, max_size: usize, fetch_batch_size: usize) -> Self {
        Self {
            min_size,
            max_size,
            fetch_batch_size,
            tokens_per_item: default_tokens_per_item(),
        }
    }

    /// Trivia, spelling and other small-item pools.
    pub fn small() -> Self {
        Self::new(5, 100, 20)
    }

    /// Vocabulary-scale pools: many cheap items per batch.
    pub fn vocabulary() -> Self {
        Self::new(10, 500, 100).with_tokens_per_item(25)
    }

    pub fn with_tokens_per_item(mut self, tokens: u64) -> Self {
        self.tokens_per_item = tokens;
        self
    }

    pub fn validate(&self, field_path: &str) -> Result<()> {
        let fail = |msg: &str, details: String| {
            Err(Error::configuration_with_context(
                msg,
                ErrorContext::new()
                    .with_field_path(field_path)
                    .with_details(details)
                    .with_source("pool_profile"),
            ))
        };
        if self.max_size == 0 {
            return fail("max_size must be positive", "max_size = 0".into());
        }
        if self.min_size > self.max_size {
            return fail(
                "min_size exceeds max_size",
                format!("min_size = {}, max_size = {}", self.min_size, self.max_size),
            );
        }
        if self.fetch_batch_size == 0 {
            return fail("fetch_batch_size must be positive", "fetch_batch_size = 0".into());
        }
        Ok(())
    }
}

impl Default for PoolProfile {
    fn default() -> Self {
        Self::small()
    }
}

/// Resolves the profile for a category key.
///
/// Keys are opaque strings; overrides match by exact key first, then by the
/// longest registered prefix, then fall back to the default profile.
#[derive(Debug, Clone, Default)]
pub struct PoolProfiles {
    default: PoolProfile,
    overrides: HashMap<String, PoolProfile>,
}

impl PoolProfiles {
    pub fn new(default: PoolProfile) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, key_prefix: impl Into<String>, profile: PoolProfile) -> Self {
        self.overrides.insert(key_prefix.into(), profile);
        self
    }

    pub fn resolve(&self, key: &str) -> &PoolProfile {
        if let Some(p) = self.overrides.get(key) {
            return p;
        }
        self.overrides
            .iter()
            .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, p)| p)
            .unwrap_or(&self.default)
    }

    pub fn validate(&self) -> Result<()> {
        self.default.validate("default_profile")?;
        for (prefix, profile) in &self.overrides {
            profile.validate(&format!("profiles.{}", prefix))?;
        }
        Ok(())
    }
}
