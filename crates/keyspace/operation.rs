//! Operation descriptors handed to the physical store and the cache.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    cache::CacheBucket,
    compression::{BitsetCompressor, Compressor},
    error::KeyspaceError,
    keys::{DbTarget, DerivedKey, Discriminators, KeyEncoding, TargetKind, ValueEncoding, derive_key},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Read,
    Write,
    Delete,
}

/// Value carried by a write.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Bytes(Bytes),
    /// Structured value, serialized as JSON by the store.
    Json(serde_json::Value),
}

impl DbValue {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            DbValue::Bytes(bytes) => Some(bytes),
            DbValue::Json(_) => None,
        }
    }

    /// Bytes written to the physical store.
    pub fn to_store_bytes(&self) -> Result<Vec<u8>, KeyspaceError> {
        match self {
            DbValue::Bytes(bytes) => Ok(bytes.to_vec()),
            DbValue::Json(value) => Ok(serde_json::to_vec(value)?),
        }
    }
}

impl From<Bytes> for DbValue {
    fn from(value: Bytes) -> Self {
        DbValue::Bytes(value)
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(value: Vec<u8>) -> Self {
        DbValue::Bytes(value.into())
    }
}

impl From<serde_json::Value> for DbValue {
    fn from(value: serde_json::Value) -> Self {
        DbValue::Json(value)
    }
}

/// A single resolved read, write or delete.
///
/// Built once per logical request, executed against the store, then passed
/// to [`crate::cache::apply_cache`] and dropped. Owns its key and value.
#[derive(Debug, Clone, PartialEq)]
pub struct DbOperation {
    target: DbTarget,
    key: Bytes,
    key_encoding: KeyEncoding,
    value_encoding: ValueEncoding,
    kind: OperationKind,
    value: Option<DbValue>,
    cache_bucket: Option<CacheBucket>,
}

impl DbOperation {
    fn new(target: DbTarget, kind: OperationKind) -> Self {
        let DerivedKey {
            key,
            key_encoding,
            value_encoding,
            cache_bucket,
        } = derive_key(&target);
        Self {
            target,
            key,
            key_encoding,
            value_encoding,
            kind,
            value: None,
            cache_bucket,
        }
    }

    pub fn read(target: DbTarget) -> Self {
        Self::new(target, OperationKind::Read)
    }

    pub fn delete(target: DbTarget) -> Self {
        Self::new(target, OperationKind::Delete)
    }

    /// Write of raw bytes. Bloom bits are compressed with [`BitsetCompressor`].
    pub fn write(target: DbTarget, value: Bytes) -> Result<Self, KeyspaceError> {
        Self::write_with(target, value, &BitsetCompressor)
    }

    /// Write of raw bytes, compressing bloom bits with `compressor`.
    pub fn write_with<C: Compressor + ?Sized>(
        target: DbTarget,
        value: Bytes,
        compressor: &C,
    ) -> Result<Self, KeyspaceError> {
        Self::write_value(target, DbValue::Bytes(value), compressor)
    }

    /// Write of a structured value, e.g. the head pointers.
    pub fn write_json(target: DbTarget, value: serde_json::Value) -> Self {
        let mut op = Self::new(target, OperationKind::Write);
        op.value = Some(DbValue::Json(value));
        op
    }

    pub fn write_value<C: Compressor + ?Sized>(
        target: DbTarget,
        value: DbValue,
        compressor: &C,
    ) -> Result<Self, KeyspaceError> {
        let mut op = Self::new(target, OperationKind::Write);
        let value = match (target, value) {
            (DbTarget::BloomBits { .. }, DbValue::Bytes(raw)) => {
                DbValue::Bytes(compressor.compress(&raw)?.into())
            }
            (DbTarget::BloomBits { .. }, DbValue::Json(_)) => {
                return Err(KeyspaceError::UnexpectedValue(TargetKind::BloomBits));
            }
            (_, value) => value,
        };
        op.value = Some(value);
        Ok(op)
    }

    pub fn read_by(kind: TargetKind, discriminators: &Discriminators) -> Result<Self, KeyspaceError> {
        Ok(Self::read(DbTarget::from_discriminators(kind, discriminators)?))
    }

    pub fn delete_by(
        kind: TargetKind,
        discriminators: &Discriminators,
    ) -> Result<Self, KeyspaceError> {
        Ok(Self::delete(DbTarget::from_discriminators(kind, discriminators)?))
    }

    pub fn write_by<C: Compressor + ?Sized>(
        kind: TargetKind,
        value: DbValue,
        discriminators: &Discriminators,
        compressor: &C,
    ) -> Result<Self, KeyspaceError> {
        let target = DbTarget::from_discriminators(kind, discriminators)?;
        Self::write_value(target, value, compressor)
    }

    pub fn target(&self) -> &DbTarget {
        &self.target
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn key_encoding(&self) -> KeyEncoding {
        self.key_encoding
    }

    pub fn value_encoding(&self) -> ValueEncoding {
        self.value_encoding
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn value(&self) -> Option<&DbValue> {
        self.value.as_ref()
    }

    pub fn cache_bucket(&self) -> Option<CacheBucket> {
        self.cache_bucket
    }
}
