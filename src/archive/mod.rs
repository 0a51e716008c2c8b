//! Archival of finished recordings to object storage
//!
//! - [`ObjectStore`]: the durable storage seam (bucket provisioning, upload,
//!   presigned retrieval URLs)
//! - [`FsObjectStore`]: an `ObjectStore` on a local directory tree
//! - [`Archiver`]: names and uploads a publish session's recording

pub mod archiver;
pub mod error;
pub mod presign;
pub mod store;

pub use archiver::{object_name, sanitize_key, ArchivedObject, Archiver, ARCHIVE_CONTENT_TYPE};
pub use error::StorageError;
pub use presign::UrlSigner;
pub use store::{FsObjectStore, ObjectMetadata, ObjectStore, StoredObject};
