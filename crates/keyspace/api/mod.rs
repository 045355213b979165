pub mod schema;

use std::fmt::Debug;

use crate::{
    error::KeyspaceError,
    keys::{KeyEncoding, ValueEncoding},
};

/// Physical key-value store the chain database is laid over.
///
/// Implementations receive the encodings resolved for each target so they
/// can pick a binary or pass-through mode. Failures are reported through
/// [`KeyspaceError`] and never retried by this crate.
pub trait KeyValueStore: Debug + Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Returns
    /// - `Ok(Some(value))` if the key exists
    /// - `Ok(None)` if the key does not exist
    /// - `Err(_)` on backend failures
    fn get(&self, key: &[u8], key_encoding: KeyEncoding) -> Result<Option<Vec<u8>>, KeyspaceError>;

    fn put(
        &self,
        key: &[u8],
        key_encoding: KeyEncoding,
        value: &[u8],
        value_encoding: ValueEncoding,
    ) -> Result<(), KeyspaceError>;

    fn delete(&self, key: &[u8], key_encoding: KeyEncoding) -> Result<(), KeyspaceError>;

    /// Checks if a key exists in the store
    fn contains(&self, key: &[u8], key_encoding: KeyEncoding) -> Result<bool, KeyspaceError> {
        Ok(self.get(key, key_encoding)?.is_some())
    }
}
