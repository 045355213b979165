//! Chain database: a physical store fronted by the byte cache.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use bytes::Bytes;
use ethereum_types::H256;
use tracing::{debug, trace};

use crate::{
    api::{KeyValueStore, schema::BLOOM_BITS_VECTOR_LEN},
    backend::in_memory::InMemoryStore,
    cache::{CacheContainer, apply_cache},
    compression::{BitsetCompressor, Compressor},
    config::CacheConfig,
    error::KeyspaceError,
    keys::{BlockNumber, DbTarget, TargetKind, ValueEncoding},
    operation::{DbOperation, DbValue, OperationKind},
};

/// Named head pointers (e.g. the head of each sync mode), stored as JSON
/// under the `Heads` target.
pub type Heads = BTreeMap<String, H256>;

/// Store and cache kept coherent behind a single commit lock.
///
/// Every write and delete is executed against the store and mirrored into
/// the cache while holding the lock, and a cache miss reads the store and
/// fills the bucket under the same lock. A fill can therefore never land
/// after a delete of the same key has completed. Cache hits do not lock.
///
/// `ChainDb` is `Clone`; clones share the store, the cache and the lock.
#[derive(Debug, Clone)]
pub struct ChainDb {
    store: Arc<dyn KeyValueStore>,
    cache: Arc<CacheContainer>,
    compressor: Arc<dyn Compressor>,
    commit: Arc<Mutex<()>>,
}

impl ChainDb {
    pub fn new(store: Arc<dyn KeyValueStore>, cache: CacheContainer) -> Self {
        Self {
            store,
            cache: Arc::new(cache),
            compressor: Arc::new(BitsetCompressor),
            commit: Arc::new(Mutex::new(())),
        }
    }

    /// In-memory database with caches built from `config`.
    pub fn in_memory(config: &CacheConfig) -> Result<Self, KeyspaceError> {
        Ok(Self::new(
            Arc::new(InMemoryStore::new()),
            CacheContainer::from_config(config)?,
        ))
    }

    /// Replaces the transform applied to bloom bits.
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn cache(&self) -> &CacheContainer {
        &self.cache
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Runs a descriptor against the store, then keeps the cache in step.
    ///
    /// Returns the stored bytes for reads and `None` for writes and deletes.
    pub fn execute(&self, op: &DbOperation) -> Result<Option<Bytes>, KeyspaceError> {
        let _commit = self.lock_commit()?;
        self.execute_locked(op)
    }

    fn lock_commit(&self) -> Result<MutexGuard<'_, ()>, KeyspaceError> {
        self.commit.lock().map_err(|_| KeyspaceError::LockError)
    }

    fn execute_locked(&self, op: &DbOperation) -> Result<Option<Bytes>, KeyspaceError> {
        match op.kind() {
            OperationKind::Read => {
                let value = self.store.get(op.key(), op.key_encoding())?;
                Ok(value.map(Bytes::from))
            }
            OperationKind::Write => {
                let value = op
                    .value()
                    .ok_or(KeyspaceError::UnexpectedValue(op.target().kind()))?
                    .to_store_bytes()?;
                self.store
                    .put(op.key(), op.key_encoding(), &value, op.value_encoding())?;
                apply_cache(op, &self.cache)?;
                Ok(None)
            }
            OperationKind::Delete => {
                self.store.delete(op.key(), op.key_encoding())?;
                apply_cache(op, &self.cache)?;
                Ok(None)
            }
        }
    }

    /// Reads a target, consulting its cache bucket first.
    pub fn get(&self, target: DbTarget) -> Result<Option<Bytes>, KeyspaceError> {
        let op = DbOperation::read(target);
        let bucket = op.cache_bucket().and_then(|b| self.cache.bucket(b));
        if let Some(cached) = bucket.map(|b| b.get(op.key())).transpose()?.flatten() {
            trace!(kind = ?target.kind(), "Cache hit");
            return Ok(Some(cached));
        }
        let _commit = self.lock_commit()?;
        let value = self.execute_locked(&op)?;
        if let (Some(bucket), Some(value)) = (bucket, &value) {
            debug!(kind = ?target.kind(), "Filling cache from store");
            bucket.set(op.key().clone(), value.clone())?;
        }
        Ok(value)
    }

    pub fn put(&self, target: DbTarget, value: Bytes) -> Result<(), KeyspaceError> {
        let op = DbOperation::write_with(target, value, self.compressor.as_ref())?;
        self.execute(&op).map(|_| ())
    }

    pub fn put_json(&self, target: DbTarget, value: serde_json::Value) -> Result<(), KeyspaceError> {
        self.execute(&DbOperation::write_json(target, value))
            .map(|_| ())
    }

    pub fn delete(&self, target: DbTarget) -> Result<(), KeyspaceError> {
        self.execute(&DbOperation::delete(target)).map(|_| ())
    }

    /// Canonical hash of the block at `number`.
    pub fn number_to_hash(&self, number: BlockNumber) -> Result<Option<H256>, KeyspaceError> {
        self.get(DbTarget::NumberToHash { number })?
            .map(|raw| decode_hash(TargetKind::NumberToHash, &raw))
            .transpose()
    }

    pub fn put_canonical_hash(&self, number: BlockNumber, hash: H256) -> Result<(), KeyspaceError> {
        self.put(
            DbTarget::NumberToHash { number },
            Bytes::copy_from_slice(hash.as_bytes()),
        )
    }

    pub fn hash_to_number(&self, hash: H256) -> Result<Option<BlockNumber>, KeyspaceError> {
        self.get(DbTarget::HashToNumber { hash })?
            .map(|raw| {
                let bytes = <[u8; 8]>::try_from(&raw[..])
                    .map_err(|_| KeyspaceError::UnexpectedValue(TargetKind::HashToNumber))?;
                Ok(u64::from_be_bytes(bytes))
            })
            .transpose()
    }

    pub fn put_block_number(&self, hash: H256, number: BlockNumber) -> Result<(), KeyspaceError> {
        self.put(
            DbTarget::HashToNumber { hash },
            Bytes::copy_from_slice(&number.to_be_bytes()),
        )
    }

    /// Head pointers, empty if none were ever stored.
    pub fn heads(&self) -> Result<Heads, KeyspaceError> {
        match self.get(DbTarget::Heads)? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Ok(Heads::new()),
        }
    }

    pub fn set_heads(&self, heads: &Heads) -> Result<(), KeyspaceError> {
        self.put_json(DbTarget::Heads, serde_json::to_value(heads)?)
    }

    /// Decompressed bloom bit vector of one section.
    pub fn bloom_bits(
        &self,
        bit: u16,
        section: u64,
        head: H256,
    ) -> Result<Option<Vec<u8>>, KeyspaceError> {
        self.get(DbTarget::BloomBits { bit, section, head })?
            .map(|raw| self.compressor.decompress(&raw, BLOOM_BITS_VECTOR_LEN))
            .transpose()
    }

    pub fn put_bloom_bits(
        &self,
        bit: u16,
        section: u64,
        head: H256,
        bits: &[u8],
    ) -> Result<(), KeyspaceError> {
        if bits.len() != BLOOM_BITS_VECTOR_LEN {
            return Err(KeyspaceError::UnexpectedValue(TargetKind::BloomBits));
        }
        self.put(
            DbTarget::BloomBits { bit, section, head },
            Bytes::copy_from_slice(bits),
        )
    }

    /// Value stored under `target` as a [`DbValue`], decoding JSON targets.
    pub fn get_value(&self, target: DbTarget) -> Result<Option<DbValue>, KeyspaceError> {
        let Some(raw) = self.get(target)? else {
            return Ok(None);
        };
        match target.kind().value_encoding() {
            ValueEncoding::Json => Ok(Some(DbValue::Json(serde_json::from_slice(&raw)?))),
            _ => Ok(Some(DbValue::Bytes(raw))),
        }
    }
}

fn decode_hash(kind: TargetKind, raw: &[u8]) -> Result<H256, KeyspaceError> {
    if raw.len() != 32 {
        return Err(KeyspaceError::UnexpectedValue(kind));
    }
    Ok(H256::from_slice(raw))
}
