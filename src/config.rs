//! Cache configuration.
//!
//! Built in code with the `with_*` methods, or loaded from YAML:
//!
//! ```yaml
//! dedup_ttl_secs: 300
//! dedup_soft_capacity: 100
//! persist_every: 10
//! default_profile: { min_size: 5, max_size: 100, fetch_batch_size: 20 }
//! profiles:
//!   "vocab|": { min_size: 10, max_size: 500, fetch_batch_size: 100, tokens_per_item: 25 }
//! prefetch_capacity: 50
//! prefetch_category: Story
//! pricing: { model: gpt-4o-mini, input_cost_per_1k: 0.00015, output_cost_per_1k: 0.0006 }
//! ```

use crate::pool::{PoolProfile, PoolProfiles};
use crate::tokens::ModelPricing;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dedup_ttl_secs: u64,
    /// Map size above which every insert sweeps expired dedup entries.
    pub dedup_soft_capacity: usize,
    /// Persist stats after this many hits. `0` disables auto-persist.
    pub persist_every: u64,
    pub default_profile: PoolProfile,
    /// Per-key-prefix profile overrides.
    pub profiles: BTreeMap<String, PoolProfile>,
    /// Stats snapshot location. Unset means the caller supplies a store, or none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_path: Option<PathBuf>,
    /// Namespaces dedup keys, e.g. by prompt template version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_salt: Option<String>,
    /// Prefetched entries kept before the oldest half is evicted.
    pub prefetch_capacity: usize,
    /// Stats category that prefetch hits and misses are reported under.
    pub prefetch_category: String,
    /// Rates used to price tokens saved in reports.
    pub pricing: ModelPricing,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dedup_ttl_secs: crate::cache::DEFAULT_DEDUP_TTL.as_secs(),
            dedup_soft_capacity: crate::cache::DEFAULT_SOFT_CAPACITY,
            persist_every: crate::stats::DEFAULT_PERSIST_EVERY,
            default_profile: PoolProfile::small(),
            profiles: BTreeMap::new(),
            stats_path: None,
            key_salt: None,
            prefetch_capacity: crate::cache::DEFAULT_PREFETCH_CAPACITY,
            prefetch_category: "Story".to_string(),
            pricing: ModelPricing::default(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// TTL in whole seconds, matching the YAML `dedup_ttl_secs` field.
    pub fn with_dedup_ttl_secs(mut self, secs: u64) -> Self {
        self.dedup_ttl_secs = secs;
        self
    }
    pub fn with_dedup_soft_capacity(mut self, capacity: usize) -> Self {
        self.dedup_soft_capacity = capacity;
        self
    }
    pub fn with_persist_every(mut self, n: u64) -> Self {
        self.persist_every = n;
        self
    }
    pub fn with_default_profile(mut self, profile: PoolProfile) -> Self {
        self.default_profile = profile;
        self
    }
    pub fn with_profile(mut self, key_prefix: impl Into<String>, profile: PoolProfile) -> Self {
        self.profiles.insert(key_prefix.into(), profile);
        self
    }
    pub fn with_stats_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.stats_path = Some(path.into());
        self
    }
    pub fn with_key_salt(mut self, salt: impl Into<String>) -> Self {
        self.key_salt = Some(salt.into());
        self
    }
    pub fn with_prefetch_capacity(mut self, capacity: usize) -> Self {
        self.prefetch_capacity = capacity;
        self
    }
    pub fn with_prefetch_category(mut self, category: impl Into<String>) -> Self {
        self.prefetch_category = category.into();
        self
    }
    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }

    pub fn pool_profiles(&self) -> PoolProfiles {
        self.profiles.iter().fold(
            PoolProfiles::new(self.default_profile.clone()),
            |acc, (prefix, profile)| acc.with_override(prefix.clone(), profile.clone()),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.dedup_ttl_secs == 0 {
            return Err(Error::configuration_with_context(
                "dedup TTL must be positive",
                ErrorContext::new()
                    .with_field_path("dedup_ttl_secs")
                    .with_source("cache_config"),
            ));
        }
        if self.prefetch_capacity == 0 {
            return Err(Error::configuration_with_context(
                "prefetch capacity must be positive",
                ErrorContext::new()
                    .with_field_path("prefetch_capacity")
                    .with_source("cache_config"),
            ));
        }
        self.pool_profiles().validate()
    }
}
