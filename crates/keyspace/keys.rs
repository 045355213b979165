//! Key space registry.
//!
//! Every logical data category of the chain database is a [`DbTarget`]
//! variant carrying exactly the identifiers its key needs. [`TargetKind`] is
//! the fieldless tag of a target and owns the static metadata: encodings,
//! cache bucket and fixed key. [`derive_key`] turns a target into the bytes
//! handed to the physical store.

use bytes::Bytes;
use ethereum_types::H256;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    api::schema::{
        BLOCK_HASH_PREFIX, BLOOM_BITS_PREFIX, BLOOM_BITS_SECTION_COUNT_KEY, BODY_PREFIX,
        CLIQUE_BLOCK_SIGNERS_KEY, CLIQUE_SIGNERS_KEY, CLIQUE_VOTES_KEY, HEAD_BLOCK_KEY,
        HEAD_HEADER_KEY, HEADER_PREFIX, HEADS_KEY, NUM_SUFFIX, RECEIPTS_PREFIX,
        SNAP_ACCOUNT_PREFIX, SNAP_DISABLED_KEY, SNAP_GENERATOR_KEY, SNAP_JOURNAL_KEY,
        SNAP_RECOVERY_KEY, SNAP_ROOT_KEY, SNAP_STORAGE_PREFIX, SNAP_SYNC_PROGRESS_KEY,
        TD_SUFFIX, TX_LOOKUP_PREFIX,
    },
    cache::CacheBucket,
    error::KeyspaceError,
};

pub type BlockNumber = u64;

/// How the physical store should treat a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyEncoding {
    Bytes,
    /// Store default, key is passed through untouched.
    None,
}

/// How the physical store should treat a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueEncoding {
    Bytes,
    Json,
    /// Store default, value is passed through untouched.
    None,
}

/// Fieldless tag of a [`DbTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetKind {
    Heads,
    HeadHeader,
    HeadBlock,
    HashToNumber,
    NumberToHash,
    TotalDifficulty,
    Body,
    Header,
    Receipts,
    TxLookup,
    CliqueSignerStates,
    CliqueVotes,
    CliqueBlockSigners,
    BloomBits,
    BloomBitsSectionCount,
    SnapAccount,
    SnapStorage,
    SnapRoot,
    SnapJournal,
    SnapGenerator,
    SnapRecovery,
    SnapDisabled,
    SnapSyncProgress,
}

impl TargetKind {
    pub const ALL: [TargetKind; 23] = [
        TargetKind::Heads,
        TargetKind::HeadHeader,
        TargetKind::HeadBlock,
        TargetKind::HashToNumber,
        TargetKind::NumberToHash,
        TargetKind::TotalDifficulty,
        TargetKind::Body,
        TargetKind::Header,
        TargetKind::Receipts,
        TargetKind::TxLookup,
        TargetKind::CliqueSignerStates,
        TargetKind::CliqueVotes,
        TargetKind::CliqueBlockSigners,
        TargetKind::BloomBits,
        TargetKind::BloomBitsSectionCount,
        TargetKind::SnapAccount,
        TargetKind::SnapStorage,
        TargetKind::SnapRoot,
        TargetKind::SnapJournal,
        TargetKind::SnapGenerator,
        TargetKind::SnapRecovery,
        TargetKind::SnapDisabled,
        TargetKind::SnapSyncProgress,
    ];

    /// Constant key of a singleton target, `None` for derived-key targets.
    pub fn fixed_key(self) -> Option<&'static [u8]> {
        let key = match self {
            TargetKind::Heads => HEADS_KEY,
            TargetKind::HeadHeader => HEAD_HEADER_KEY,
            TargetKind::HeadBlock => HEAD_BLOCK_KEY,
            TargetKind::CliqueSignerStates => CLIQUE_SIGNERS_KEY,
            TargetKind::CliqueVotes => CLIQUE_VOTES_KEY,
            TargetKind::CliqueBlockSigners => CLIQUE_BLOCK_SIGNERS_KEY,
            TargetKind::BloomBitsSectionCount => BLOOM_BITS_SECTION_COUNT_KEY,
            TargetKind::SnapRoot => SNAP_ROOT_KEY,
            TargetKind::SnapJournal => SNAP_JOURNAL_KEY,
            TargetKind::SnapGenerator => SNAP_GENERATOR_KEY,
            TargetKind::SnapRecovery => SNAP_RECOVERY_KEY,
            TargetKind::SnapDisabled => SNAP_DISABLED_KEY,
            TargetKind::SnapSyncProgress => SNAP_SYNC_PROGRESS_KEY,
            TargetKind::HashToNumber
            | TargetKind::NumberToHash
            | TargetKind::TotalDifficulty
            | TargetKind::Body
            | TargetKind::Header
            | TargetKind::Receipts
            | TargetKind::TxLookup
            | TargetKind::BloomBits
            | TargetKind::SnapAccount
            | TargetKind::SnapStorage => return None,
        };
        Some(key)
    }

    pub fn is_fixed(self) -> bool {
        self.fixed_key().is_some()
    }

    pub fn key_encoding(self) -> KeyEncoding {
        match self {
            TargetKind::BloomBitsSectionCount => KeyEncoding::None,
            _ => KeyEncoding::Bytes,
        }
    }

    pub fn value_encoding(self) -> ValueEncoding {
        match self {
            TargetKind::Heads => ValueEncoding::Json,
            TargetKind::BloomBitsSectionCount => ValueEncoding::None,
            _ => ValueEncoding::Bytes,
        }
    }

    /// Cache bucket mirroring this target, if it is cached at all.
    ///
    /// Singleton pointers and bloom bits are never cached.
    pub fn cache_bucket(self) -> Option<CacheBucket> {
        match self {
            TargetKind::HashToNumber => Some(CacheBucket::HashToNumber),
            TargetKind::NumberToHash => Some(CacheBucket::NumberToHash),
            TargetKind::TotalDifficulty => Some(CacheBucket::TotalDifficulty),
            TargetKind::Body => Some(CacheBucket::Body),
            TargetKind::Header => Some(CacheBucket::Header),
            TargetKind::Receipts => Some(CacheBucket::Receipts),
            TargetKind::TxLookup => Some(CacheBucket::TxLookup),
            TargetKind::SnapAccount => Some(CacheBucket::SnapAccount),
            TargetKind::SnapStorage => Some(CacheBucket::SnapStorage),
            _ => None,
        }
    }
}

/// A fully identified entry of the chain database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbTarget {
    Heads,
    HeadHeader,
    HeadBlock,
    HashToNumber {
        hash: H256,
    },
    NumberToHash {
        number: BlockNumber,
    },
    TotalDifficulty {
        number: BlockNumber,
        hash: H256,
    },
    Body {
        number: BlockNumber,
        hash: H256,
    },
    Header {
        number: BlockNumber,
        hash: H256,
    },
    Receipts {
        number: BlockNumber,
        hash: H256,
    },
    TxLookup {
        tx_hash: H256,
    },
    CliqueSignerStates,
    CliqueVotes,
    CliqueBlockSigners,
    BloomBits {
        bit: u16,
        section: u64,
        head: H256,
    },
    BloomBitsSectionCount,
    SnapAccount {
        account_hash: H256,
    },
    SnapStorage {
        account_hash: H256,
        storage_hash: H256,
    },
    SnapRoot,
    SnapJournal,
    SnapGenerator,
    SnapRecovery,
    SnapDisabled,
    SnapSyncProgress,
}

impl DbTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            DbTarget::Heads => TargetKind::Heads,
            DbTarget::HeadHeader => TargetKind::HeadHeader,
            DbTarget::HeadBlock => TargetKind::HeadBlock,
            DbTarget::HashToNumber { .. } => TargetKind::HashToNumber,
            DbTarget::NumberToHash { .. } => TargetKind::NumberToHash,
            DbTarget::TotalDifficulty { .. } => TargetKind::TotalDifficulty,
            DbTarget::Body { .. } => TargetKind::Body,
            DbTarget::Header { .. } => TargetKind::Header,
            DbTarget::Receipts { .. } => TargetKind::Receipts,
            DbTarget::TxLookup { .. } => TargetKind::TxLookup,
            DbTarget::CliqueSignerStates => TargetKind::CliqueSignerStates,
            DbTarget::CliqueVotes => TargetKind::CliqueVotes,
            DbTarget::CliqueBlockSigners => TargetKind::CliqueBlockSigners,
            DbTarget::BloomBits { .. } => TargetKind::BloomBits,
            DbTarget::BloomBitsSectionCount => TargetKind::BloomBitsSectionCount,
            DbTarget::SnapAccount { .. } => TargetKind::SnapAccount,
            DbTarget::SnapStorage { .. } => TargetKind::SnapStorage,
            DbTarget::SnapRoot => TargetKind::SnapRoot,
            DbTarget::SnapJournal => TargetKind::SnapJournal,
            DbTarget::SnapGenerator => TargetKind::SnapGenerator,
            DbTarget::SnapRecovery => TargetKind::SnapRecovery,
            DbTarget::SnapDisabled => TargetKind::SnapDisabled,
            DbTarget::SnapSyncProgress => TargetKind::SnapSyncProgress,
        }
    }

    /// Physical key bytes of this target.
    pub fn key(&self) -> Vec<u8> {
        match *self {
            DbTarget::HashToNumber { hash } => hash_to_number_key(hash),
            DbTarget::NumberToHash { number } => number_to_hash_key(number),
            DbTarget::TotalDifficulty { number, hash } => td_key(number, hash),
            DbTarget::Body { number, hash } => block_key(BODY_PREFIX, number, hash),
            DbTarget::Header { number, hash } => block_key(HEADER_PREFIX, number, hash),
            DbTarget::Receipts { number, hash } => block_key(RECEIPTS_PREFIX, number, hash),
            DbTarget::TxLookup { tx_hash } => hash_key(TX_LOOKUP_PREFIX, tx_hash),
            DbTarget::BloomBits { bit, section, head } => bloom_bits_key(bit, section, head),
            DbTarget::SnapAccount { account_hash } => hash_key(SNAP_ACCOUNT_PREFIX, account_hash),
            DbTarget::SnapStorage {
                account_hash,
                storage_hash,
            } => snap_storage_key(account_hash, storage_hash),
            DbTarget::Heads => HEADS_KEY.to_vec(),
            DbTarget::HeadHeader => HEAD_HEADER_KEY.to_vec(),
            DbTarget::HeadBlock => HEAD_BLOCK_KEY.to_vec(),
            DbTarget::CliqueSignerStates => CLIQUE_SIGNERS_KEY.to_vec(),
            DbTarget::CliqueVotes => CLIQUE_VOTES_KEY.to_vec(),
            DbTarget::CliqueBlockSigners => CLIQUE_BLOCK_SIGNERS_KEY.to_vec(),
            DbTarget::BloomBitsSectionCount => BLOOM_BITS_SECTION_COUNT_KEY.to_vec(),
            DbTarget::SnapRoot => SNAP_ROOT_KEY.to_vec(),
            DbTarget::SnapJournal => SNAP_JOURNAL_KEY.to_vec(),
            DbTarget::SnapGenerator => SNAP_GENERATOR_KEY.to_vec(),
            DbTarget::SnapRecovery => SNAP_RECOVERY_KEY.to_vec(),
            DbTarget::SnapDisabled => SNAP_DISABLED_KEY.to_vec(),
            DbTarget::SnapSyncProgress => SNAP_SYNC_PROGRESS_KEY.to_vec(),
        }
    }

    /// Resolves a loosely populated [`Discriminators`] bundle into a target.
    ///
    /// Fixed-key targets ignore the bundle. Derived-key targets fail with
    /// [`KeyspaceError::MissingDiscriminator`] naming the first absent field;
    /// no key is ever derived from partial data.
    pub fn from_discriminators(
        kind: TargetKind,
        discriminators: &Discriminators,
    ) -> Result<Self, KeyspaceError> {
        let d = discriminators;
        let target = match kind {
            TargetKind::Heads => DbTarget::Heads,
            TargetKind::HeadHeader => DbTarget::HeadHeader,
            TargetKind::HeadBlock => DbTarget::HeadBlock,
            TargetKind::CliqueSignerStates => DbTarget::CliqueSignerStates,
            TargetKind::CliqueVotes => DbTarget::CliqueVotes,
            TargetKind::CliqueBlockSigners => DbTarget::CliqueBlockSigners,
            TargetKind::BloomBitsSectionCount => DbTarget::BloomBitsSectionCount,
            TargetKind::SnapRoot => DbTarget::SnapRoot,
            TargetKind::SnapJournal => DbTarget::SnapJournal,
            TargetKind::SnapGenerator => DbTarget::SnapGenerator,
            TargetKind::SnapRecovery => DbTarget::SnapRecovery,
            TargetKind::SnapDisabled => DbTarget::SnapDisabled,
            TargetKind::SnapSyncProgress => DbTarget::SnapSyncProgress,
            TargetKind::HashToNumber => DbTarget::HashToNumber {
                hash: require(kind, "block_hash", d.block_hash)?,
            },
            TargetKind::NumberToHash => DbTarget::NumberToHash {
                number: require(kind, "block_number", d.block_number)?,
            },
            TargetKind::TotalDifficulty => DbTarget::TotalDifficulty {
                number: require(kind, "block_number", d.block_number)?,
                hash: require(kind, "block_hash", d.block_hash)?,
            },
            TargetKind::Body => DbTarget::Body {
                number: require(kind, "block_number", d.block_number)?,
                hash: require(kind, "block_hash", d.block_hash)?,
            },
            TargetKind::Header => DbTarget::Header {
                number: require(kind, "block_number", d.block_number)?,
                hash: require(kind, "block_hash", d.block_hash)?,
            },
            TargetKind::Receipts => DbTarget::Receipts {
                number: require(kind, "block_number", d.block_number)?,
                hash: require(kind, "block_hash", d.block_hash)?,
            },
            TargetKind::TxLookup => DbTarget::TxLookup {
                tx_hash: require(kind, "tx_hash", d.tx_hash)?,
            },
            TargetKind::BloomBits => DbTarget::BloomBits {
                bit: require(kind, "bit", d.bit)?,
                section: require(kind, "section", d.section)?,
                head: require(kind, "hash", d.hash)?,
            },
            TargetKind::SnapAccount => DbTarget::SnapAccount {
                account_hash: require(kind, "account_hash", d.account_hash)?,
            },
            TargetKind::SnapStorage => DbTarget::SnapStorage {
                account_hash: require(kind, "account_hash", d.account_hash)?,
                storage_hash: require(kind, "storage_hash", d.storage_hash)?,
            },
        };
        Ok(target)
    }
}

fn require<T>(target: TargetKind, field: &'static str, value: Option<T>) -> Result<T, KeyspaceError> {
    value.ok_or(KeyspaceError::MissingDiscriminator { target, field })
}

/// Optional identifiers a caller may supply when it only knows the target
/// kind at runtime. Prefer building a [`DbTarget`] directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Discriminators {
    pub block_number: Option<BlockNumber>,
    pub block_hash: Option<H256>,
    pub tx_hash: Option<H256>,
    pub bit: Option<u16>,
    pub section: Option<u64>,
    pub hash: Option<H256>,
    pub account_hash: Option<H256>,
    pub storage_hash: Option<H256>,
}

impl Discriminators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_number(mut self, number: BlockNumber) -> Self {
        self.block_number = Some(number);
        self
    }

    pub fn with_block_hash(mut self, hash: H256) -> Self {
        self.block_hash = Some(hash);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: H256) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }

    pub fn with_bit(mut self, bit: u16) -> Self {
        self.bit = Some(bit);
        self
    }

    pub fn with_section(mut self, section: u64) -> Self {
        self.section = Some(section);
        self
    }

    pub fn with_hash(mut self, hash: H256) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn with_account_hash(mut self, account_hash: H256) -> Self {
        self.account_hash = Some(account_hash);
        self
    }

    pub fn with_storage_hash(mut self, storage_hash: H256) -> Self {
        self.storage_hash = Some(storage_hash);
        self
    }
}

/// Everything the physical store and the cache need to locate a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    pub key: Bytes,
    pub key_encoding: KeyEncoding,
    pub value_encoding: ValueEncoding,
    pub cache_bucket: Option<CacheBucket>,
}

pub fn derive_key(target: &DbTarget) -> DerivedKey {
    let kind = target.kind();
    let key = Bytes::from(target.key());
    trace!(?kind, key = %hex::encode(&key), "Derived key");
    DerivedKey {
        key,
        key_encoding: kind.key_encoding(),
        value_encoding: kind.value_encoding(),
        cache_bucket: kind.cache_bucket(),
    }
}

// --- Key encoding helpers ---

/// `"h" + num(8 BE) + "n"`
fn number_to_hash_key(number: BlockNumber) -> Vec<u8> {
    let mut key = Vec::with_capacity(10);
    key.push(HEADER_PREFIX);
    key.extend_from_slice(&number.to_be_bytes());
    key.push(NUM_SUFFIX);
    key
}

/// `"H" + hash(32)`
fn hash_to_number_key(hash: H256) -> Vec<u8> {
    hash_key(BLOCK_HASH_PREFIX, hash)
}

/// `prefix + num(8 BE) + hash(32)`
fn block_key(prefix: u8, number: BlockNumber, hash: H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(41);
    key.push(prefix);
    key.extend_from_slice(&number.to_be_bytes());
    key.extend_from_slice(hash.as_bytes());
    key
}

/// `"h" + num(8 BE) + hash(32) + "t"`
fn td_key(number: BlockNumber, hash: H256) -> Vec<u8> {
    let mut key = block_key(HEADER_PREFIX, number, hash);
    key.push(TD_SUFFIX);
    key
}

/// `prefix + hash(32)`
fn hash_key(prefix: u8, hash: H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(prefix);
    key.extend_from_slice(hash.as_bytes());
    key
}

/// `"B" + bit(2 BE) + section(8 BE) + hash(32)`
fn bloom_bits_key(bit: u16, section: u64, head: H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(43);
    key.push(BLOOM_BITS_PREFIX);
    key.extend_from_slice(&bit.to_be_bytes());
    key.extend_from_slice(&section.to_be_bytes());
    key.extend_from_slice(head.as_bytes());
    key
}

/// `"o" + account_hash(32) + storage_hash(32)`
fn snap_storage_key(account_hash: H256, storage_hash: H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(65);
    key.push(SNAP_STORAGE_PREFIX);
    key.extend_from_slice(account_hash.as_bytes());
    key.extend_from_slice(storage_hash.as_bytes());
    key
}
