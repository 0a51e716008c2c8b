//! Error types
//!
//! Each concern has its own error enum; [`Error`] wraps them for code that
//! crosses module boundaries (sessions, the listener).

use thiserror::Error;

pub use crate::archive::StorageError;
pub use crate::registry::RegistryError;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FLV error: {0}")]
    Flv(#[from] FlvError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// FLV framing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlvError {
    #[error("invalid FLV signature")]
    InvalidSignature,

    #[error("unsupported FLV version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid FLV header length {0}")]
    InvalidHeaderLength(u32),

    #[error("stream ended inside a tag")]
    Truncated,

    #[error("tag payload of {0} bytes exceeds limit")]
    TagTooLarge(usize),
}

/// Errors raised by the bundled stream transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid request line: {0}")]
    InvalidRequest(String),

    #[error("request line exceeds {0} bytes")]
    RequestTooLong(usize),

    #[error("timed out waiting for request line")]
    RequestTimeout,

    #[error("no codec headers before first media tag")]
    MissingHeaders,
}

impl Error {
    /// Whether this error means the peer simply went away
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            Error::Flv(FlvError::Truncated) => true,
            _ => false,
        }
    }
}
