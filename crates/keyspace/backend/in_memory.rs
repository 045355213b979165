use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    api::KeyValueStore,
    error::KeyspaceError,
    keys::{KeyEncoding, ValueEncoding},
};

/// Ordered in-memory store, shared between clones.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore(Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>);

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<MutexGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>, KeyspaceError> {
        self.0.lock().map_err(|_| KeyspaceError::LockError)
    }

    pub fn len(&self) -> Result<usize, KeyspaceError> {
        Ok(self.inner()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, KeyspaceError> {
        Ok(self.inner()?.is_empty())
    }
}

// Encodings only matter to stores with typed codecs; every key and value is
// kept as raw bytes here.
impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &[u8], _key_encoding: KeyEncoding) -> Result<Option<Vec<u8>>, KeyspaceError> {
        Ok(self.inner()?.get(key).cloned())
    }

    fn put(
        &self,
        key: &[u8],
        _key_encoding: KeyEncoding,
        value: &[u8],
        _value_encoding: ValueEncoding,
    ) -> Result<(), KeyspaceError> {
        self.inner()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8], _key_encoding: KeyEncoding) -> Result<(), KeyspaceError> {
        self.inner()?.remove(key);
        Ok(())
    }
}
