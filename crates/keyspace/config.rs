//! TOML-compatible cache configuration.
//!
//! ```toml
//! enabled = true
//!
//! [capacities]
//! header = 512
//! numberToHash = 2048
//! ```
//!
//! Buckets left out of `capacities` are not created and their targets are
//! never cached. Listing a bucket replaces the whole default table.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{cache::CacheBucket, error::KeyspaceError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch, no bucket is created when `false`.
    pub enabled: bool,
    /// Maximum number of entries per bucket, keyed by bucket name.
    pub capacities: BTreeMap<String, usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let capacities = CacheBucket::ALL
            .into_iter()
            .map(|bucket| (bucket.name().to_string(), default_capacity(bucket)))
            .collect();
        Self {
            enabled: true,
            capacities,
        }
    }
}

fn default_capacity(bucket: CacheBucket) -> usize {
    match bucket {
        CacheBucket::HashToNumber | CacheBucket::NumberToHash => 2048,
        CacheBucket::TotalDifficulty | CacheBucket::TxLookup => 1024,
        CacheBucket::Header => 512,
        CacheBucket::Body | CacheBucket::Receipts => 256,
        CacheBucket::SnapAccount | CacheBucket::SnapStorage => 4096,
    }
}

impl CacheConfig {
    /// Config with every bucket left out.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            capacities: BTreeMap::new(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, KeyspaceError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, KeyspaceError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), KeyspaceError> {
        self.capacities().map(|_| ())
    }

    /// Typed capacities, rejecting unknown bucket names and zero sizes.
    pub fn capacities(&self) -> Result<Vec<(CacheBucket, usize)>, KeyspaceError> {
        self.capacities
            .iter()
            .map(|(name, &capacity)| {
                let bucket: CacheBucket = name.parse()?;
                if capacity == 0 {
                    return Err(KeyspaceError::InvalidConfig(format!(
                        "capacities.{name} must be > 0"
                    )));
                }
                Ok((bucket, capacity))
            })
            .collect()
    }
}
