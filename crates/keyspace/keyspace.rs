//! Key space of the chain database.
//!
//! Maps every logical data category of the node (headers, bodies, receipts,
//! canonical indices, clique state, bloom bits, snapshot data) to the exact
//! bytes stored in the underlying key-value store, and keeps an in-memory
//! byte cache coherent with what was written.
//!
//! - [`keys`]: targets, their key layouts and encodings
//! - [`operation`]: read/write/delete descriptors built from targets
//! - [`cache`]: cache buckets and [`cache::apply_cache`]
//! - [`chain_db`]: a store fronted by the cache, for callers that want both
//!
//! ```ignore
//! let db = ChainDb::in_memory(&CacheConfig::default())?;
//! db.put_canonical_hash(42, block_hash)?;
//! assert_eq!(db.number_to_hash(42)?, Some(block_hash));
//! ```

pub mod api;
pub mod backend;
pub mod cache;
pub mod chain_db;
pub mod compression;
pub mod config;
pub mod error;
pub mod keys;
pub mod operation;

pub use api::KeyValueStore;
pub use backend::in_memory::InMemoryStore;
pub use cache::{BytesCache, CacheBucket, CacheContainer, LruBytesCache, apply_cache};
pub use chain_db::{ChainDb, Heads};
pub use compression::{BitsetCompressor, Compressor, SnappyCompressor};
pub use config::CacheConfig;
pub use error::KeyspaceError;
pub use keys::{
    BlockNumber, DbTarget, DerivedKey, Discriminators, KeyEncoding, TargetKind, ValueEncoding,
    derive_key,
};
pub use operation::{DbOperation, DbValue, OperationKind};
