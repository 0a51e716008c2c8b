//! Presigned URL signatures
//!
//! A signature is a BLAKE3 keyed hash over `bucket\nobject\nexpires`. The key
//! is derived from the configured secret, so rotating the secret invalidates
//! every outstanding URL.

use chrono::{DateTime, Utc};

use super::error::StorageError;

const KEY_CONTEXT: &str = "livehub 2024-01-01 presigned object url v1";

/// Signs and verifies object retrieval URLs
#[derive(Clone)]
pub struct UrlSigner {
    key: [u8; 32],
}

impl UrlSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
        }
    }

    /// Hex signature for `bucket/object` valid until `expires` (unix seconds)
    pub fn sign(&self, bucket: &str, object: &str, expires: i64) -> String {
        self.mac(bucket, object, expires).to_hex().to_string()
    }

    /// Check a signature and its expiry against `now`
    pub fn verify(
        &self,
        bucket: &str,
        object: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if now.timestamp() > expires {
            return Err(StorageError::InvalidSignature);
        }

        let provided =
            blake3::Hash::from_hex(signature).map_err(|_| StorageError::InvalidSignature)?;

        // blake3::Hash equality is constant-time
        if self.mac(bucket, object, expires) == provided {
            Ok(())
        } else {
            Err(StorageError::InvalidSignature)
        }
    }

    fn mac(&self, bucket: &str, object: &str, expires: i64) -> blake3::Hash {
        let message = format!("{}\n{}\n{}", bucket, object, expires);
        blake3::keyed_hash(&self.key, message.as_bytes())
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}
