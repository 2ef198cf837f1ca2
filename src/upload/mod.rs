//! Idempotent image uploads on a bounded pool.
//!
//! [`Uploader::upload`] returns a `'static` future that the export session
//! spawns; the future waits for a pool permit, checks whether the object is
//! already in the bucket and only transfers bytes when it is not. Uploads of
//! the same key are serialized, so within one run a key is transferred at
//! most once and every later attempt short-circuits on the existence check.
//!
//! Publishing runs after the transfer and outside the per-upload timeout, so
//! a slow ACL call cannot strand a written object. If publishing itself fails
//! the object stays private, and a later run sees it as already present
//! without publishing it again.

use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::error::LabelshipError;
use crate::ir::{ImageSource, PixelBuffer, PixelLayout};
use crate::storage::{content_type_for_path, ObjectStore};

/// Default number of uploads allowed in flight.
pub const DEFAULT_WORKERS: usize = 10;

/// Quality used when re-encoding pixel buffers.
pub const JPEG_QUALITY: u8 = 75;

/// Extension appended to content-hash names.
pub const CONTENT_KEY_EXTENSION: &str = "jpg";

/// How an upload task resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    /// Bytes were transferred and the object made public.
    Uploaded,
    /// The object was already in the bucket; nothing was transferred.
    AlreadyPresent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub key: String,
    pub uri: String,
    pub status: UploadStatus,
}

/// Derives the object name for an image.
///
/// Files keep their own name (the last path segment). Pixel buffers are named
/// by the SHA-256 of their raw bytes, so identical pixels share one object.
pub fn image_name(image: &ImageSource) -> Result<String, LabelshipError> {
    match image {
        ImageSource::Path(path) => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| LabelshipError::MissingFileName { path: path.clone() }),
        ImageSource::Pixels(buffer) => Ok(content_name(buffer.as_bytes())),
    }
}

/// `<hex sha256>.jpg`
pub fn content_name(bytes: &[u8]) -> String {
    format!(
        "{}.{}",
        hex::encode(Sha256::digest(bytes)),
        CONTENT_KEY_EXTENSION
    )
}

/// Joins a dataset prefix and an object name with a single `/`.
pub fn object_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Encodes a pixel buffer as JPEG in memory.
///
/// JPEG has no alpha channel, so RGBA input is flattened to RGB first.
pub fn encode_jpeg(buffer: &PixelBuffer) -> Result<Vec<u8>, image::ImageError> {
    let (pixels, color): (Cow<'_, [u8]>, _) = match buffer.layout() {
        PixelLayout::Gray8 => (Cow::Borrowed(buffer.as_bytes()), ExtendedColorType::L8),
        PixelLayout::Rgb8 => (Cow::Borrowed(buffer.as_bytes()), ExtendedColorType::Rgb8),
        PixelLayout::Rgba8 => {
            let rgb = buffer
                .as_bytes()
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            (Cow::Owned(rgb), ExtendedColorType::Rgb8)
        }
    };

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode(
        &pixels,
        buffer.width(),
        buffer.height(),
        color,
    )?;
    Ok(out)
}

/// One async mutex per object key, forgotten once nobody holds or awaits it.
#[derive(Debug, Default)]
struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.table().entry(key.to_string()).or_default().clone()
    }

    /// Drops the entry for `key` if the table holds its only reference.
    fn release(&self, key: &str) {
        let mut locks = self.table();
        if locks
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table().len()
    }
}

/// Releases a key's table entry on drop. Must outlive the key's guard.
struct KeyLease {
    locks: Arc<KeyLocks>,
    key: String,
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        self.locks.release(&self.key);
    }
}

/// Uploads images into one bucket with bounded concurrency.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    permits: Arc<Semaphore>,
    locks: Arc<KeyLocks>,
    timeout: Option<Duration>,
}

impl Uploader {
    /// `workers` is clamped to at least 1.
    pub fn new(store: Arc<dyn ObjectStore>, workers: usize, timeout: Option<Duration>) -> Self {
        Self {
            store,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            locks: Arc::new(KeyLocks::default()),
            timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Builds the upload task for `image` under the full object `key`.
    ///
    /// Nothing happens until the returned future is polled. The timeout, if
    /// any, covers the existence check and the transfer. It does not cover the
    /// wait for a pool slot or the final publish step.
    pub fn upload(
        &self,
        image: ImageSource,
        key: String,
    ) -> impl Future<Output = Result<UploadOutcome, LabelshipError>> + Send + 'static {
        let store = Arc::clone(&self.store);
        let permits = Arc::clone(&self.permits);
        let locks = Arc::clone(&self.locks);
        let key_lock = locks.get(&key);
        let timeout = self.timeout;

        async move {
            let _lease = KeyLease {
                locks,
                key: key.clone(),
            };
            let _key_guard = key_lock.lock_owned().await;
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| LabelshipError::WorkerFailed {
                    key: key.clone(),
                    message: "upload pool closed".to_string(),
                })?;

            let work = transfer(store.as_ref(), image, &key);
            let status = match timeout {
                Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                    LabelshipError::UploadTimeout {
                        key: key.clone(),
                        limit,
                    }
                })?,
                None => work.await,
            }?;

            let uri = store.uri(&key);
            if status == UploadStatus::Uploaded {
                store
                    .make_public(&key)
                    .await
                    .map_err(|source| LabelshipError::Storage {
                        key: key.clone(),
                        source,
                    })?;
                info!(uri = %uri, "uploaded");
            }

            Ok(UploadOutcome { key, uri, status })
        }
    }
}

/// Checks for `key` and writes the image when it is missing.
async fn transfer(
    store: &dyn ObjectStore,
    image: ImageSource,
    key: &str,
) -> Result<UploadStatus, LabelshipError> {
    let storage_err = |source| LabelshipError::Storage {
        key: key.to_string(),
        source,
    };

    if store.exists(key).await.map_err(storage_err)? {
        debug!(key, "already in bucket, skipping");
        return Ok(UploadStatus::AlreadyPresent);
    }

    match image {
        ImageSource::Pixels(buffer) => {
            let bytes = encode_on_blocking_pool(buffer, key).await?;
            store
                .put_bytes(key, bytes, "image/jpeg")
                .await
                .map_err(storage_err)?;
        }
        ImageSource::Path(path) => {
            store
                .put_file(key, &path, content_type_for_path(&path))
                .await
                .map_err(storage_err)?;
        }
    }

    Ok(UploadStatus::Uploaded)
}

async fn encode_on_blocking_pool(buffer: PixelBuffer, key: &str) -> Result<Vec<u8>, LabelshipError> {
    tokio::task::spawn_blocking(move || encode_jpeg(&buffer))
        .await
        .map_err(|e| LabelshipError::WorkerFailed {
            key: key.to_string(),
            message: e.to_string(),
        })?
        .map_err(|source| LabelshipError::Encode {
            key: key.to_string(),
            source,
        })
}
