//! A bucket backed by a local directory.
//!
//! Objects live at `<root>/<bucket>/<key>`. Useful for dry runs and for
//! staging an export before syncing it elsewhere.
//!
//! Writes land in a `.partial-<pid>` sibling first and are renamed into place
//! only once complete, so an object path never holds a truncated file.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Url;

use super::{ObjectStore, StorageError};

#[derive(Clone, Debug)]
pub struct DirBucket {
    root: PathBuf,
    bucket: String,
}

impl DirBucket {
    /// A relative `root` is resolved against the current directory.
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root: std::path::absolute(&root).unwrap_or(root),
            bucket: bucket.into(),
        }
    }

    /// The directory standing in for the bucket.
    pub fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let mut path = self.bucket_dir();
        path.extend(key.split('/').filter(|s| !s.is_empty()));
        path
    }

    async fn prepare_parent(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".partial-{}", std::process::id()));
    path.with_file_name(name)
}

/// Renames a fully written `partial` onto `path`, or removes it if the write
/// (or the rename) failed.
async fn commit(partial: &Path, path: &Path, written: io::Result<()>) -> Result<(), StorageError> {
    let result = match written {
        Ok(()) => tokio::fs::rename(partial, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(partial).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for DirBucket {
    /// The root must exist; the bucket directory under it is created on demand.
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        if !tokio::fs::try_exists(&self.root).await? {
            return Err(StorageError::BucketNotFound(format!(
                "{} (root {} does not exist)",
                self.bucket,
                self.root.display()
            )));
        }
        tokio::fs::create_dir_all(self.bucket_dir()).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.object_path(key)).await?)
    }

    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.object_path(key);
        self.prepare_parent(&path).await?;
        let partial = partial_path(&path);
        let written = tokio::fs::write(&partial, bytes).await;
        commit(&partial, &path, written).await
    }

    async fn put_file(
        &self,
        key: &str,
        source: &Path,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.object_path(key);
        self.prepare_parent(&path).await?;
        let partial = partial_path(&path);
        let written = tokio::fs::copy(source, &partial).await.map(|_| ());
        commit(&partial, &path, written).await
    }

    async fn make_public(&self, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).await?;
        }
        #[cfg(not(unix))]
        {
            tokio::fs::metadata(&path).await?;
        }
        Ok(())
    }

    fn uri(&self, key: &str) -> String {
        let path = self.object_path(key);
        match Url::from_file_path(&path) {
            Ok(url) => url.to_string(),
            Err(()) => format!("file://{}", path.display()),
        }
    }
}
