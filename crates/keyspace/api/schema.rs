//! Key prefixes and fixed keys of the chain database.
//!
//! The layout follows the rawdb schema shared by geth-compatible clients, so
//! a database written through this crate stays readable by existing tooling
//! and vice versa. Changing any of these bytes orphans stored data.
//!
//! | Data               | Key format                                   |
//! |--------------------|----------------------------------------------|
//! | Head pointers      | `"heads"`                                    |
//! | Canonical hash     | `"h" + num(8 BE) + "n"`                      |
//! | Total difficulty   | `"h" + num(8 BE) + hash(32) + "t"`           |
//! | Block header       | `"h" + num(8 BE) + hash(32)`                 |
//! | Block body         | `"b" + num(8 BE) + hash(32)`                 |
//! | Receipts           | `"r" + num(8 BE) + hash(32)`                 |
//! | Block number       | `"H" + hash(32)`                             |
//! | Tx lookup          | `"l" + tx_hash(32)`                          |
//! | Bloom bits         | `"B" + bit(2 BE) + section(8 BE) + hash(32)` |
//! | Snapshot account   | `"a" + account_hash(32)`                     |
//! | Snapshot storage   | `"o" + account_hash(32) + storage_hash(32)`  |

/// Named head pointers, stored as a JSON object: `"heads"`
pub const HEADS_KEY: &[u8] = b"heads";

/// Hash of the latest known header: `"LastHeader"`
pub const HEAD_HEADER_KEY: &[u8] = b"LastHeader";

/// Hash of the latest full block: `"LastBlock"`
pub const HEAD_BLOCK_KEY: &[u8] = b"LastBlock";

pub const CLIQUE_SIGNERS_KEY: &[u8] = b"CliqueSigners";
pub const CLIQUE_VOTES_KEY: &[u8] = b"CliqueVotes";
pub const CLIQUE_BLOCK_SIGNERS_KEY: &[u8] = b"CliqueBlockSignersSnapshot";

/// Number of bloom bit sections already indexed: `"scount"`
pub const BLOOM_BITS_SECTION_COUNT_KEY: &[u8] = b"scount";

pub const SNAP_ROOT_KEY: &[u8] = b"SnapshotRoot";
pub const SNAP_JOURNAL_KEY: &[u8] = b"SnapshotJournal";
pub const SNAP_GENERATOR_KEY: &[u8] = b"SnapshotGenerator";
pub const SNAP_RECOVERY_KEY: &[u8] = b"SnapshotRecovery";
pub const SNAP_DISABLED_KEY: &[u8] = b"SnapshotDisabled";
pub const SNAP_SYNC_PROGRESS_KEY: &[u8] = b"SnapshotSyncStatus";

pub const HEADER_PREFIX: u8 = b'h';
pub const TD_SUFFIX: u8 = b't';
pub const NUM_SUFFIX: u8 = b'n';
pub const BLOCK_HASH_PREFIX: u8 = b'H';
pub const BODY_PREFIX: u8 = b'b';
pub const RECEIPTS_PREFIX: u8 = b'r';
pub const TX_LOOKUP_PREFIX: u8 = b'l';
pub const BLOOM_BITS_PREFIX: u8 = b'B';
pub const SNAP_ACCOUNT_PREFIX: u8 = b'a';
pub const SNAP_STORAGE_PREFIX: u8 = b'o';

/// Blocks covered by one bloom bits section.
pub const BLOOM_BITS_SECTION_SIZE: u64 = 4096;

/// Uncompressed length of one bloom bit vector.
pub const BLOOM_BITS_VECTOR_LEN: usize = (BLOOM_BITS_SECTION_SIZE / 8) as usize;

pub const FIXED_KEYS: [&[u8]; 13] = [
    HEADS_KEY,
    HEAD_HEADER_KEY,
    HEAD_BLOCK_KEY,
    CLIQUE_SIGNERS_KEY,
    CLIQUE_VOTES_KEY,
    CLIQUE_BLOCK_SIGNERS_KEY,
    BLOOM_BITS_SECTION_COUNT_KEY,
    SNAP_ROOT_KEY,
    SNAP_JOURNAL_KEY,
    SNAP_GENERATOR_KEY,
    SNAP_RECOVERY_KEY,
    SNAP_DISABLED_KEY,
    SNAP_SYNC_PROGRESS_KEY,
];
