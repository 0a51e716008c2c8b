//! Archive naming and upload
//!
//! An [`Archiver`] turns a finished scratch recording into one named object
//! in the configured bucket.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::StreamKey;

use super::error::StorageError;
use super::store::ObjectStore;

/// Content type of every archived recording
pub const ARCHIVE_CONTENT_TYPE: &str = "video/x-flv";

const ARCHIVE_EXTENSION: &str = "flv";
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// A recording that reached durable storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedObject {
    /// Object name within the archive bucket
    pub name: String,
    pub uploaded_at: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
}

/// Uploads recordings into one bucket of an [`ObjectStore`]
#[derive(Clone)]
pub struct Archiver {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl Archiver {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Provision the bucket. Called once at startup.
    pub async fn prepare(&self) -> Result<(), StorageError> {
        self.store.ensure_bucket(&self.bucket).await
    }

    /// Upload the recording at `path` under a fresh name for `key`
    pub async fn upload(
        &self,
        key: &StreamKey,
        path: &Path,
        size: u64,
    ) -> Result<ArchivedObject, StorageError> {
        let name = object_name(key, Utc::now(), &unique_suffix());

        self.store
            .put_object(&self.bucket, &name, path, ARCHIVE_CONTENT_TYPE)
            .await?;

        let object = ArchivedObject {
            name,
            uploaded_at: Utc::now(),
            size,
        };

        tracing::info!(
            stream = %key,
            bucket = %self.bucket,
            object = %object.name,
            size = object.size,
            "Archive uploaded"
        );

        Ok(object)
    }

    /// Presigned retrieval URL for an archived object
    pub async fn presigned_url(
        &self,
        object: &ArchivedObject,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        self.store
            .presigned_get_url(&self.bucket, &object.name, ttl)
            .await
    }
}

impl std::fmt::Debug for Archiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archiver")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

/// Object name for a recording of `key` finished at `at`
///
/// `{key}/{YYYYMMDD-HHMMSS}-{suffix}.flv`
pub fn object_name(key: &StreamKey, at: DateTime<Utc>, suffix: &str) -> String {
    format!(
        "{}/{}-{}.{}",
        sanitize_key(key.as_str()),
        at.format(TIMESTAMP_FORMAT),
        suffix,
        ARCHIVE_EXTENSION
    )
}

/// Make a stream key safe to use as an object name prefix
pub fn sanitize_key(key: &str) -> String {
    let segments: Vec<String> = key
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(|s| {
            s.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect()
        })
        .collect();

    if segments.is_empty() {
        StreamKey::DEFAULT.to_string()
    } else {
        segments.join("/")
    }
}

fn unique_suffix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}
