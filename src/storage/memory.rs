//! In-memory bucket with per-key instrumentation.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{ObjectStore, StorageError};

/// An object held by a [`MemoryBucket`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub public: bool,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, StoredObject>,
    exists_checks: HashMap<String, usize>,
    transfers: HashMap<String, usize>,
    failing: HashSet<String>,
    latency: HashMap<String, Duration>,
    publish_latency: HashMap<String, Duration>,
}

/// A bucket that lives in process memory.
///
/// Besides storing objects it counts existence checks and data transfers per
/// key, can be told to fail or delay writes for specific keys, and records
/// the highest number of writes that were in flight at once.
#[derive(Debug)]
pub struct MemoryBucket {
    name: String,
    state: Mutex<State>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryBucket {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State::default()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Makes every write to `key` fail with [`StorageError::Rejected`].
    pub fn fail_writes_to(&self, key: impl Into<String>) {
        self.lock().failing.insert(key.into());
    }

    /// Delays every write to `key` by `delay`.
    pub fn delay_writes_to(&self, key: impl Into<String>, delay: Duration) {
        self.lock().latency.insert(key.into(), delay);
    }

    /// Delays making `key` public by `delay`.
    pub fn delay_publish_of(&self, key: impl Into<String>, delay: Duration) {
        self.lock().publish_latency.insert(key.into(), delay);
    }

    /// Seeds an object as if a previous run had uploaded it.
    pub fn insert(&self, key: impl Into<String>, bytes: Vec<u8>, content_type: &str) {
        self.lock().objects.insert(
            key.into(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                public: true,
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.lock().objects.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().objects.contains_key(key)
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn exists_checks(&self, key: &str) -> usize {
        self.lock().exists_checks.get(key).copied().unwrap_or(0)
    }

    /// Number of data transfers (byte or file uploads) to `key`.
    pub fn transfers(&self, key: &str) -> usize {
        self.lock().transfers.get(key).copied().unwrap_or(0)
    }

    pub fn total_transfers(&self) -> usize {
        self.lock().transfers.values().sum()
    }

    /// Highest number of concurrent writes observed so far.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test thread panicked mid-update.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn write(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.lock().latency.get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut state = self.lock();
            *state.transfers.entry(key.to_string()).or_insert(0) += 1;
            if state.failing.contains(key) {
                Err(StorageError::Rejected(format!(
                    "injected failure writing '{key}'"
                )))
            } else {
                state.objects.insert(
                    key.to_string(),
                    StoredObject {
                        bytes,
                        content_type: content_type.to_string(),
                        public: false,
                    },
                );
                Ok(())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl ObjectStore for MemoryBucket {
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let mut state = self.lock();
        *state.exists_checks.entry(key.to_string()).or_insert(0) += 1;
        Ok(state.objects.contains_key(key))
    }

    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.write(key, bytes, content_type).await
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let bytes = tokio::fs::read(path).await?;
        self.write(key, bytes, content_type).await
    }

    async fn make_public(&self, key: &str) -> Result<(), StorageError> {
        let delay = self.lock().publish_latency.get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.lock().objects.get_mut(key) {
            Some(object) => {
                object.public = true;
                Ok(())
            }
            None => Err(StorageError::Rejected(format!("no such object '{key}'"))),
        }
    }

    fn uri(&self, key: &str) -> String {
        format!("mem://{}/{}", self.name, key)
    }
}
