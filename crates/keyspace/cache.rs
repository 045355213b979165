//! In-memory mirror of cached store entries.
//!
//! The cache is split in [`CacheBucket`]s, one per cached target family. A
//! [`CacheContainer`] holds the configured buckets; missing buckets simply
//! disable caching for their targets. [`apply_cache`] keeps the container in
//! lock-step with completed store writes and deletes.

use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
    num::NonZeroUsize,
    str::FromStr,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::CacheConfig,
    error::KeyspaceError,
    operation::{DbOperation, DbValue, OperationKind},
};

/// Named partition of the cache, one per cached target family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CacheBucket {
    #[serde(rename = "hashToNumber")]
    HashToNumber,
    #[serde(rename = "numberToHash")]
    NumberToHash,
    #[serde(rename = "td")]
    TotalDifficulty,
    #[serde(rename = "body")]
    Body,
    #[serde(rename = "header")]
    Header,
    #[serde(rename = "receipts")]
    Receipts,
    #[serde(rename = "txLookup")]
    TxLookup,
    #[serde(rename = "snapAccount")]
    SnapAccount,
    #[serde(rename = "snapStorage")]
    SnapStorage,
}

impl CacheBucket {
    pub const ALL: [CacheBucket; 9] = [
        CacheBucket::HashToNumber,
        CacheBucket::NumberToHash,
        CacheBucket::TotalDifficulty,
        CacheBucket::Body,
        CacheBucket::Header,
        CacheBucket::Receipts,
        CacheBucket::TxLookup,
        CacheBucket::SnapAccount,
        CacheBucket::SnapStorage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CacheBucket::HashToNumber => "hashToNumber",
            CacheBucket::NumberToHash => "numberToHash",
            CacheBucket::TotalDifficulty => "td",
            CacheBucket::Body => "body",
            CacheBucket::Header => "header",
            CacheBucket::Receipts => "receipts",
            CacheBucket::TxLookup => "txLookup",
            CacheBucket::SnapAccount => "snapAccount",
            CacheBucket::SnapStorage => "snapStorage",
        }
    }
}

impl fmt::Display for CacheBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CacheBucket {
    type Err = KeyspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheBucket::ALL
            .into_iter()
            .find(|bucket| bucket.name() == s)
            .ok_or_else(|| KeyspaceError::UnknownBucket(s.to_string()))
    }
}

/// Key to bytes cache backing one bucket.
pub trait BytesCache: Debug + Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, KeyspaceError>;
    fn set(&self, key: Bytes, value: Bytes) -> Result<(), KeyspaceError>;
    fn delete(&self, key: &[u8]) -> Result<(), KeyspaceError>;
    fn len(&self) -> Result<usize, KeyspaceError>;

    fn is_empty(&self) -> Result<bool, KeyspaceError> {
        Ok(self.len()? == 0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
}

/// Entry-bounded LRU byte cache.
#[derive(Debug)]
pub struct LruBytesCache {
    inner: Mutex<LruCache<Bytes, Bytes>>,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
}

impl LruBytesCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
        }
    }
}

impl BytesCache for LruBytesCache {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, KeyspaceError> {
        let value = self
            .inner
            .lock()
            .map_err(|_| KeyspaceError::LockError)?
            .get(key)
            .cloned();
        let counter = if value.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    fn set(&self, key: Bytes, value: Bytes) -> Result<(), KeyspaceError> {
        self.inner
            .lock()
            .map_err(|_| KeyspaceError::LockError)?
            .put(key, value);
        self.inserts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KeyspaceError> {
        self.inner
            .lock()
            .map_err(|_| KeyspaceError::LockError)?
            .pop(key);
        Ok(())
    }

    fn len(&self) -> Result<usize, KeyspaceError> {
        Ok(self.inner.lock().map_err(|_| KeyspaceError::LockError)?.len())
    }
}

/// Configured cache buckets.
#[derive(Debug, Default)]
pub struct CacheContainer {
    buckets: BTreeMap<CacheBucket, Box<dyn BytesCache>>,
}

impl CacheContainer {
    /// Container with no buckets, caching disabled for every target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one LRU bucket per configured capacity.
    pub fn from_config(config: &CacheConfig) -> Result<Self, KeyspaceError> {
        let capacities = config.capacities()?;
        let mut container = Self::new();
        if !config.enabled {
            info!("Chain db cache disabled");
            return Ok(container);
        }
        for (bucket, capacity) in capacities {
            let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
                KeyspaceError::InvalidConfig(format!("capacity of {bucket} must be > 0"))
            })?;
            container.insert(bucket, Box::new(LruBytesCache::new(capacity)));
        }
        info!(
            buckets = container.buckets.len(),
            "Chain db cache initialized"
        );
        Ok(container)
    }

    pub fn insert(&mut self, bucket: CacheBucket, cache: Box<dyn BytesCache>) {
        self.buckets.insert(bucket, cache);
    }

    pub fn with_bucket(mut self, bucket: CacheBucket, cache: Box<dyn BytesCache>) -> Self {
        self.insert(bucket, cache);
        self
    }

    pub fn bucket(&self, bucket: CacheBucket) -> Option<&dyn BytesCache> {
        self.buckets.get(&bucket).map(|cache| &**cache)
    }

    /// Looks a bucket up by its persisted name, e.g. `"numberToHash"`.
    pub fn bucket_by_name(&self, name: &str) -> Option<&dyn BytesCache> {
        let bucket = name.parse().ok()?;
        self.bucket(bucket)
    }

    pub fn contains(&self, bucket: CacheBucket) -> bool {
        self.buckets.contains_key(&bucket)
    }

    pub fn buckets(&self) -> impl Iterator<Item = CacheBucket> + '_ {
        self.buckets.keys().copied()
    }
}

/// Mirrors a completed store operation into the cache.
///
/// Writes of raw bytes are stored under the operation key and deletes evict
/// it. Structured values are never cached: such a write evicts the key, so
/// the cache only ever holds byte-exact copies of store entries. Targets without a bucket, or whose bucket is not
/// configured, are skipped. Must be called in the same order the store
/// commits the operations.
///
/// # Errors
///
/// [`KeyspaceError::UnsupportedCacheOperation`] when given a read.
pub fn apply_cache(op: &DbOperation, cache: &CacheContainer) -> Result<(), KeyspaceError> {
    let kind = op.kind();
    if kind == OperationKind::Read {
        return Err(KeyspaceError::UnsupportedCacheOperation(kind));
    }
    let Some(bucket) = op.cache_bucket() else {
        return Ok(());
    };
    let Some(entries) = cache.bucket(bucket) else {
        debug!(%bucket, "Cache bucket not configured, skipping");
        return Ok(());
    };
    match (kind, op.value()) {
        (OperationKind::Write, Some(DbValue::Bytes(value))) => {
            debug!(%bucket, len = value.len(), "Caching written value");
            entries.set(op.key().clone(), value.clone())
        }
        // Structured values are not cached, but the previous bytes are stale.
        (OperationKind::Write, _) => {
            debug!(%bucket, "Evicting entry overwritten by a structured value");
            entries.delete(op.key())
        }
        (OperationKind::Delete, _) => {
            debug!(%bucket, "Evicting deleted value");
            entries.delete(op.key())
        }
        (OperationKind::Read, _) => Err(KeyspaceError::UnsupportedCacheOperation(kind)),
    }
}
