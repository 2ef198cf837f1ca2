//! Object storage backends.
//!
//! The exporter only needs a handful of per-object operations, keyed by the
//! object's name inside one bucket. Each backend implements [`ObjectStore`]:
//!
//! - [`GcsBucket`]: Google Cloud Storage JSON API over HTTPS
//! - [`DirBucket`]: a local directory laid out like a bucket
//! - [`MemoryBucket`]: in-process store with instrumentation, for tests

mod dir;
mod gcs;
mod memory;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use dir::DirBucket;
pub use gcs::{GcsBucket, DEFAULT_ENDPOINT as GCS_DEFAULT_ENDPOINT};
pub use memory::{MemoryBucket, StoredObject};

/// Failures reported by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket '{0}' does not exist")]
    BucketNotFound(String),

    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Rejected(String),
}

/// The storage operations an export consumes.
///
/// Keys are full object names inside the bucket, e.g. `"coco/000042.jpg"`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fails with [`StorageError::BucketNotFound`] if the bucket is unusable.
    async fn ensure_bucket(&self) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Uploads a local file, streaming it rather than reading it whole.
    async fn put_file(&self, key: &str, path: &Path, content_type: &str)
        -> Result<(), StorageError>;

    async fn make_public(&self, key: &str) -> Result<(), StorageError>;

    /// The canonical URI of `key`. Pure: does not touch the backend.
    fn uri(&self, key: &str) -> String;
}

/// Guesses a content type from a file extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("csv") => "text/csv",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for_path(Path::new("a/b.JPG")), "image/jpeg");
        assert_eq!(content_type_for_path(Path::new("x.png")), "image/png");
        assert_eq!(
            content_type_for_path(Path::new("noext")),
            "application/octet-stream"
        );
    }
}
