//! End-to-end flows: descriptor → store → cache.
#![allow(clippy::unwrap_used)]

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, mpsc},
    thread,
    time::Duration,
};

use bytes::Bytes;
use ethereum_types::H256;
use ethrex_keyspace::{
    BitsetCompressor, BytesCache, CacheBucket, CacheConfig, CacheContainer, ChainDb, Compressor,
    DbOperation, DbTarget, DbValue, Discriminators, InMemoryStore, KeyEncoding, KeyValueStore,
    KeyspaceError, LruBytesCache, SnappyCompressor, TargetKind, ValueEncoding, apply_cache,
    api::schema::BLOOM_BITS_VECTOR_LEN,
};
use hex_literal::hex;

const BLOCK_HASH: H256 = H256(hex!(
    "d4e56740f876aef8c010b86a40d5f56745a118d0906a34e69aec8c0db1cb8fa3"
));

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn full_cache() -> CacheContainer {
    CacheContainer::from_config(&CacheConfig::default()).unwrap()
}

#[test]
fn number_to_hash_write_cache_delete() {
    init_tracing();
    let store = InMemoryStore::new();
    let cache = full_cache();

    let discriminators = Discriminators::new().with_block_number(42);
    let write = DbOperation::write_by(
        TargetKind::NumberToHash,
        DbValue::Bytes(Bytes::copy_from_slice(BLOCK_HASH.as_bytes())),
        &discriminators,
        &BitsetCompressor,
    )
    .unwrap();

    let mut expected_key = vec![b'h'];
    expected_key.extend_from_slice(&42u64.to_be_bytes());
    expected_key.push(b'n');
    assert_eq!(&write.key()[..], expected_key.as_slice());

    store
        .put(
            write.key(),
            write.key_encoding(),
            &write.value().unwrap().to_store_bytes().unwrap(),
            write.value_encoding(),
        )
        .unwrap();
    apply_cache(&write, &cache).unwrap();

    let bucket = cache.bucket_by_name("numberToHash").unwrap();
    assert_eq!(
        bucket.get(write.key()).unwrap().as_deref(),
        Some(BLOCK_HASH.as_bytes())
    );

    let delete = DbOperation::delete_by(TargetKind::NumberToHash, &discriminators).unwrap();
    assert_eq!(delete.key(), write.key());
    store.delete(delete.key(), delete.key_encoding()).unwrap();
    apply_cache(&delete, &cache).unwrap();

    assert_eq!(bucket.get(write.key()).unwrap(), None);
    assert_eq!(store.get(write.key(), write.key_encoding()).unwrap(), None);
}

#[test]
fn bloom_bits_round_trip_through_store() {
    init_tracing();
    let db = ChainDb::in_memory(&CacheConfig::default()).unwrap();

    let mut raw = vec![0u8; BLOOM_BITS_VECTOR_LEN];
    raw[0] = 0x01;
    raw[77] = 0xf0;
    raw[511] = 0x80;

    let op = DbOperation::write(
        DbTarget::BloomBits {
            bit: 3,
            section: 7,
            head: BLOCK_HASH,
        },
        Bytes::from(raw.clone()),
    )
    .unwrap();
    let stored = op.value().and_then(DbValue::as_bytes).unwrap().clone();
    assert_eq!(stored.to_vec(), BitsetCompressor.compress(&raw).unwrap());
    assert_ne!(stored.to_vec(), raw);

    db.execute(&op).unwrap();
    let from_store = db
        .store()
        .get(op.key(), op.key_encoding())
        .unwrap()
        .unwrap();
    assert_eq!(
        BitsetCompressor
            .decompress(&from_store, BLOOM_BITS_VECTOR_LEN)
            .unwrap(),
        raw
    );
    assert_eq!(db.bloom_bits(3, 7, BLOCK_HASH).unwrap(), Some(raw));

    // No bucket exists for bloom bits, nothing may have been cached.
    for bucket in db.cache().buckets() {
        assert!(db.cache().bucket(bucket).unwrap().is_empty().unwrap());
    }
}

#[test]
fn snappy_compressor_can_be_swapped_in() {
    let db = ChainDb::in_memory(&CacheConfig::disabled())
        .unwrap()
        .with_compressor(Arc::new(SnappyCompressor));
    let mut raw = vec![0u8; BLOOM_BITS_VECTOR_LEN];
    raw[100] = 0xaa;
    db.put_bloom_bits(1, 2, BLOCK_HASH, &raw).unwrap();
    assert_eq!(db.bloom_bits(1, 2, BLOCK_HASH).unwrap(), Some(raw));
    assert_eq!(db.bloom_bits(1, 3, BLOCK_HASH).unwrap(), None);
}

#[test]
fn cache_mirrors_store_for_every_bucketed_target() {
    init_tracing();
    let db = ChainDb::in_memory(&CacheConfig::default()).unwrap();
    let other = H256::repeat_byte(0x5a);
    let targets = [
        DbTarget::HashToNumber { hash: BLOCK_HASH },
        DbTarget::NumberToHash { number: 1 },
        DbTarget::TotalDifficulty {
            number: 1,
            hash: BLOCK_HASH,
        },
        DbTarget::Body {
            number: 1,
            hash: BLOCK_HASH,
        },
        DbTarget::Header {
            number: 1,
            hash: BLOCK_HASH,
        },
        DbTarget::Receipts {
            number: 1,
            hash: BLOCK_HASH,
        },
        DbTarget::TxLookup { tx_hash: other },
        DbTarget::SnapAccount {
            account_hash: other,
        },
        DbTarget::SnapStorage {
            account_hash: other,
            storage_hash: BLOCK_HASH,
        },
    ];

    for (i, target) in targets.into_iter().enumerate() {
        let bucket = target.kind().cache_bucket().unwrap();
        let value = Bytes::from(vec![i as u8 + 1; 4]);
        db.put(target, value.clone()).unwrap();

        let cached = db.cache().bucket(bucket).unwrap();
        assert_eq!(cached.get(&target.key()).unwrap(), Some(value.clone()), "{bucket}");
        assert_eq!(db.get(target).unwrap(), Some(value));

        db.delete(target).unwrap();
        assert_eq!(cached.get(&target.key()).unwrap(), None, "{bucket}");
        assert_eq!(db.get(target).unwrap(), None);
    }
}

#[test]
fn singleton_targets_are_never_cached() {
    let db = ChainDb::in_memory(&CacheConfig::default()).unwrap();
    db.put(DbTarget::HeadBlock, Bytes::copy_from_slice(BLOCK_HASH.as_bytes()))
        .unwrap();
    db.put(DbTarget::HeadHeader, Bytes::copy_from_slice(BLOCK_HASH.as_bytes()))
        .unwrap();
    db.put(DbTarget::BloomBitsSectionCount, Bytes::from_static(&[0, 0, 0, 9]))
        .unwrap();

    for bucket in CacheBucket::ALL {
        assert!(db.cache().bucket(bucket).unwrap().is_empty().unwrap());
    }
    assert_eq!(
        db.store()
            .get(b"LastBlock", KeyEncoding::Bytes)
            .unwrap()
            .as_deref(),
        Some(BLOCK_HASH.as_bytes())
    );
    assert!(
        db.store()
            .contains(b"scount", KeyEncoding::None)
            .unwrap()
    );
}

#[test]
fn only_configured_buckets_are_filled() {
    let config = CacheConfig::from_toml_str("[capacities]\nheader = 2\n").unwrap();
    let db = ChainDb::in_memory(&config).unwrap();
    assert_eq!(db.cache().buckets().collect::<Vec<_>>(), vec![CacheBucket::Header]);

    db.put_canonical_hash(10, BLOCK_HASH).unwrap();
    db.put(
        DbTarget::Header {
            number: 10,
            hash: BLOCK_HASH,
        },
        Bytes::from_static(b"rlp"),
    )
    .unwrap();

    assert_eq!(db.number_to_hash(10).unwrap(), Some(BLOCK_HASH));
    assert_eq!(
        db.cache()
            .bucket(CacheBucket::Header)
            .unwrap()
            .len()
            .unwrap(),
        1
    );
}

#[test]
fn config_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.toml");
    std::fs::write(&path, "enabled = true\n[capacities]\ntxLookup = 16\nbody = 4\n").unwrap();

    let config = CacheConfig::load(&path).unwrap();
    let cache = CacheContainer::from_config(&config).unwrap();
    assert!(cache.contains(CacheBucket::TxLookup));
    assert!(cache.contains(CacheBucket::Body));
    assert!(!cache.contains(CacheBucket::Header));

    assert!(matches!(
        CacheConfig::load(dir.path().join("missing.toml")),
        Err(KeyspaceError::Io(_))
    ));
}

#[test]
fn custom_bucket_backend() {
    let cache = CacheContainer::new().with_bucket(
        CacheBucket::Receipts,
        Box::new(LruBytesCache::new(NonZeroUsize::new(1).unwrap())),
    );
    let db = ChainDb::new(Arc::new(InMemoryStore::new()), cache);
    let first = DbTarget::Receipts {
        number: 1,
        hash: BLOCK_HASH,
    };
    let second = DbTarget::Receipts {
        number: 2,
        hash: BLOCK_HASH,
    };
    db.put(first, Bytes::from_static(b"one")).unwrap();
    db.put(second, Bytes::from_static(b"two")).unwrap();

    // Capacity one: the first entry was evicted but the store still has it.
    let bucket = db.cache().bucket(CacheBucket::Receipts).unwrap();
    assert_eq!(bucket.get(&first.key()).unwrap(), None);
    assert_eq!(db.get(first).unwrap(), Some(Bytes::from_static(b"one")));
    assert_eq!(bucket.get(&first.key()).unwrap(), Some(Bytes::from_static(b"one")));
}

#[test]
fn read_descriptors_cannot_touch_the_cache() {
    let cache = full_cache();
    let op = DbOperation::read_by(
        TargetKind::TxLookup,
        &Discriminators::new().with_tx_hash(BLOCK_HASH),
    )
    .unwrap();
    assert!(matches!(
        apply_cache(&op, &cache),
        Err(KeyspaceError::UnsupportedCacheOperation(_))
    ));
}

/// Store whose next `get` parks after reading until released.
#[derive(Debug, Default)]
struct PausingStore {
    inner: InMemoryStore,
    pause: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
}

impl PausingStore {
    /// Arms the pause. Returns a receiver signalled once a `get` has read
    /// its value and a sender that lets it return.
    fn pause_next_get(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (reached_tx, reached_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.pause.lock().unwrap() = Some((reached_tx, release_rx));
        (reached_rx, release_tx)
    }
}

impl KeyValueStore for PausingStore {
    fn get(&self, key: &[u8], key_encoding: KeyEncoding) -> Result<Option<Vec<u8>>, KeyspaceError> {
        let value = self.inner.get(key, key_encoding)?;
        let pause = self.pause.lock().unwrap().take();
        if let Some((reached, release)) = pause {
            reached.send(()).unwrap();
            release.recv().unwrap();
        }
        Ok(value)
    }

    fn put(
        &self,
        key: &[u8],
        key_encoding: KeyEncoding,
        value: &[u8],
        value_encoding: ValueEncoding,
    ) -> Result<(), KeyspaceError> {
        self.inner.put(key, key_encoding, value, value_encoding)
    }

    fn delete(&self, key: &[u8], key_encoding: KeyEncoding) -> Result<(), KeyspaceError> {
        self.inner.delete(key, key_encoding)
    }
}

#[test]
fn cache_fill_never_outlives_a_concurrent_delete() {
    init_tracing();
    let target = DbTarget::NumberToHash { number: 42 };
    let store = Arc::new(PausingStore::default());
    store
        .inner
        .put(&target.key(), KeyEncoding::Bytes, b"x", ValueEncoding::Bytes)
        .unwrap();
    let db = ChainDb::new(store.clone(), full_cache());

    // The reader misses the cache and parks right after reading the store.
    let (reached, release) = store.pause_next_get();
    let reader = {
        let db = db.clone();
        thread::spawn(move || db.get(target).unwrap())
    };
    reached.recv().unwrap();

    let deleter = {
        let db = db.clone();
        thread::spawn(move || db.delete(target).unwrap())
    };
    // Give the delete every chance to commit while the reader is parked.
    thread::sleep(Duration::from_millis(50));
    release.send(()).unwrap();

    assert_eq!(reader.join().unwrap(), Some(Bytes::from_static(b"x")));
    deleter.join().unwrap();

    let bucket = db.cache().bucket(CacheBucket::NumberToHash).unwrap();
    assert_eq!(bucket.get(&target.key()).unwrap(), None);
    assert_eq!(store.inner.get(&target.key(), KeyEncoding::Bytes).unwrap(), None);
    assert_eq!(db.get(target).unwrap(), None);
}

#[test]
fn structured_overwrite_is_not_shadowed_by_cached_bytes() {
    let db = ChainDb::in_memory(&CacheConfig::default()).unwrap();
    let target = DbTarget::Header {
        number: 3,
        hash: BLOCK_HASH,
    };
    db.put(target, Bytes::from_static(b"old")).unwrap();
    db.put_json(target, serde_json::json!({ "new": 1 })).unwrap();

    let bucket = db.cache().bucket(CacheBucket::Header).unwrap();
    assert_eq!(bucket.get(&target.key()).unwrap(), None);
    assert_eq!(
        db.get(target).unwrap(),
        Some(Bytes::from_static(br#"{"new":1}"#))
    );
}
