//! Storage error types

use thiserror::Error;

/// Error type for object storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("invalid object name: {0}")]
    InvalidObjectName(String),

    #[error("invalid or expired signature")]
    InvalidSignature,

    #[error("object metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
