//! Object storage seam and a filesystem-backed implementation

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StorageError;
use super::presign::UrlSigner;

const METADATA_SUFFIX: &str = ".meta.json";
const PART_SUFFIX: &str = ".part";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Durable storage for archived recordings
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the bucket if it does not exist. Idempotent.
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Upload a local file as one named object
    async fn put_object(
        &self,
        bucket: &str,
        name: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Issue a time-limited URL for fetching an object
    async fn presigned_get_url(
        &self,
        bucket: &str,
        name: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;
}

/// Sidecar metadata stored next to each object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// An opened object ready to be streamed
#[derive(Debug)]
pub struct StoredObject {
    pub file: tokio::fs::File,
    pub metadata: ObjectMetadata,
}

/// Object store on a local directory tree: `root/<bucket>/<object>`
///
/// Presigned URLs point at `public_url/objects/<bucket>/<object>` and are
/// checked by [`FsObjectStore::open_signed`].
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    public_url: String,
    signer: UrlSigner,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str, secret: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
            signer: UrlSigner::new(secret),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Verify a presigned request and open the object
    pub async fn open_signed(
        &self,
        bucket: &str,
        name: &str,
        expires: i64,
        signature: &str,
    ) -> Result<StoredObject, StorageError> {
        self.signer
            .verify(bucket, name, expires, signature, Utc::now())?;

        let path = self.object_path(bucket, name)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::ObjectNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = match tokio::fs::read(metadata_path(&path)).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ObjectMetadata {
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                size: file.metadata().await?.len(),
                uploaded_at: Utc::now(),
            },
            Err(e) => return Err(e.into()),
        };

        Ok(StoredObject { file, metadata })
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_component(bucket) {
            return Err(StorageError::InvalidObjectName(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.bucket_dir(bucket)?;
        if name.is_empty() || name.ends_with(METADATA_SUFFIX) || name.ends_with(PART_SUFFIX) {
            return Err(StorageError::InvalidObjectName(name.to_string()));
        }
        for component in name.split('/') {
            if !is_valid_component(component) {
                return Err(StorageError::InvalidObjectName(name.to_string()));
            }
            path.push(component);
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let dir = self.bucket_dir(bucket)?;
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(bucket = bucket, path = %dir.display(), "Bucket ready");
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        name: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let bucket_dir = self.bucket_dir(bucket)?;
        if let Err(e) = tokio::fs::metadata(&bucket_dir).await {
            return Err(if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::BucketNotFound(bucket.to_string())
            } else {
                e.into()
            });
        }

        let dest = self.object_path(bucket, name)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Copy to a side file first so readers never see a partial object
        let part = with_suffix(&dest, PART_SUFFIX);
        let size = match tokio::fs::copy(path, &part).await {
            Ok(size) => size,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e.into());
            }
        };
        tokio::fs::rename(&part, &dest).await?;

        let metadata = ObjectMetadata {
            content_type: content_type.to_string(),
            size,
            uploaded_at: Utc::now(),
        };
        tokio::fs::write(metadata_path(&dest), serde_json::to_vec_pretty(&metadata)?).await?;

        tracing::debug!(bucket = bucket, object = name, size = size, "Object stored");
        Ok(())
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        name: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let path = self.object_path(bucket, name)?;
        if tokio::fs::metadata(&path).await.is_err() {
            return Err(StorageError::ObjectNotFound(name.to_string()));
        }

        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        let signature = self.signer.sign(bucket, name, expires);

        Ok(format!(
            "{}/objects/{}/{}?expires={}&signature={}",
            self.public_url, bucket, name, expires, signature
        ))
    }
}

/// Path component made only of URL-safe characters, never `.` or `..`
fn is_valid_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && component
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

fn metadata_path(object: &Path) -> PathBuf {
    with_suffix(object, METADATA_SUFFIX)
}
