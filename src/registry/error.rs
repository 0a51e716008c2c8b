//! Registry error types

use thiserror::Error;

use super::frame::StreamKey;

/// Error type for registry and hub operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No live stream under this key
    #[error("stream not found: {0}")]
    StreamNotFound(StreamKey),

    /// A live hub already occupies the key and the policy is to reject
    #[error("stream already has a publisher: {0}")]
    StreamAlreadyPublishing(StreamKey),

    /// A hub cannot be created without codec headers
    #[error("codec header set is empty")]
    EmptyHeaders,
}
