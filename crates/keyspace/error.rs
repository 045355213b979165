use thiserror::Error;

use crate::{keys::TargetKind, operation::OperationKind};

/// Errors produced while resolving, executing or caching database operations.
///
/// Variants fall in two families. Contract violations mean the caller built a
/// request that can never be valid and must not be retried. Every other
/// variant wraps a failure from a collaborator (store, codec, compressor) and
/// is passed through unchanged.
#[derive(Debug, Error)]
pub enum KeyspaceError {
    #[error("Missing discriminator `{field}` required by target {target:?}")]
    MissingDiscriminator {
        target: TargetKind,
        field: &'static str,
    },
    #[error("Unsupported cache operation: {0:?}")]
    UnsupportedCacheOperation(OperationKind),
    #[error("Unknown cache bucket: {0}")]
    UnknownBucket(String),
    #[error("Invalid cache config: {0}")]
    InvalidConfig(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Snappy error: {0}")]
    Snappy(#[from] snap::Error),
    #[error("Serde error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Unexpected value for {0:?}")]
    UnexpectedValue(TargetKind),
    #[error("Failed to acquire lock")]
    LockError,
    #[error("{0}")]
    Custom(String),
}

impl KeyspaceError {
    /// Whether the error stems from a malformed request rather than a failing
    /// collaborator.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            KeyspaceError::MissingDiscriminator { .. }
                | KeyspaceError::UnsupportedCacheOperation(_)
                | KeyspaceError::UnknownBucket(_)
        )
    }
}
