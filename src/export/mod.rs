//! The export coordinator.
//!
//! An export moves through four states, each a distinct step in the API:
//!
//! 1. [`ExportOptions`] describes the run (idle).
//! 2. [`ExportSession::setup`] checks the bucket and zeroes the split counters.
//! 3. [`ExportSession::export_sample`] streams samples: the upload task is
//!    spawned first, then rows are built and appended on the calling task.
//! 4. [`ExportSession::finish`] waits for every upload and publishes the
//!    manifest. It consumes the session, so nothing can be exported after it.
//!
//! Uploads run in the background and may finish in any order; rows are
//! appended on the caller's task in sample order and never wait on them.
//! Dropping a session without calling `finish` aborts its outstanding uploads
//! and publishes nothing.

pub mod report;

pub use report::{ExportReport, Plan};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::{Id, JoinSet};
use tracing::{error, info};

use crate::error::LabelshipError;
use crate::ir::Sample;
use crate::manifest::{build_rows, ImageRef, Manifest, MANIFEST_FILE_NAME};
use crate::split::{SplitAllocator, SplitFractions};
use crate::storage::ObjectStore;
use crate::upload::{image_name, object_key, UploadOutcome, UploadStatus, Uploader, DEFAULT_WORKERS};

/// Everything an export needs besides the samples and the bucket.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Dataset name; also the object prefix inside the bucket.
    pub dataset: String,
    /// Allowed class labels. Detections of other classes are skipped.
    pub classes: Vec<String>,
    pub fractions: SplitFractions,
    /// Sample count the split quotas are computed against.
    pub total_samples: usize,
    /// Upload pool width.
    pub workers: usize,
    /// Per-upload limit. `None` waits indefinitely.
    pub upload_timeout: Option<Duration>,
    pub image_ref: ImageRef,
}

impl ExportOptions {
    /// Options with the default fractions (0.7/0.2/0.1) and pool width.
    pub fn new(dataset: impl Into<String>, classes: Vec<String>, total_samples: usize) -> Self {
        Self {
            dataset: dataset.into(),
            classes,
            fractions: SplitFractions::default(),
            total_samples,
            workers: DEFAULT_WORKERS,
            upload_timeout: None,
            image_ref: ImageRef::default(),
        }
    }

    /// Rejects options that cannot describe a run.
    pub fn validate(&self) -> Result<(), LabelshipError> {
        if self.dataset.trim_matches('/').is_empty() {
            return Err(LabelshipError::InvalidConfig {
                message: "dataset name must not be empty".to_string(),
            });
        }
        if self.classes.is_empty() {
            return Err(LabelshipError::InvalidConfig {
                message: "at least one class is required".to_string(),
            });
        }
        if self.classes.iter().any(|c| c.trim().is_empty()) {
            return Err(LabelshipError::InvalidConfig {
                message: "class names must not be empty".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(LabelshipError::InvalidConfig {
                message: "worker pool needs at least 1 worker".to_string(),
            });
        }
        self.fractions.check()
    }

    fn allocator(&self) -> SplitAllocator {
        SplitAllocator::new(self.classes.iter().cloned(), self.fractions, self.total_samples)
    }

    fn manifest_key(&self) -> String {
        object_key(&self.dataset, MANIFEST_FILE_NAME)
    }
}

#[derive(Debug, Default)]
struct UploadTally {
    total: usize,
    uploaded: usize,
    already_present: usize,
    failed: usize,
    first_failure: Option<LabelshipError>,
}

/// A running export. See the module docs for the lifecycle.
pub struct ExportSession {
    options: ExportOptions,
    store: Arc<dyn ObjectStore>,
    uploader: Uploader,
    allocator: SplitAllocator,
    manifest: Manifest,
    pending: JoinSet<Result<UploadOutcome, LabelshipError>>,
    pending_keys: HashMap<Id, String>,
    runtime: Handle,
    samples: usize,
}

impl ExportSession {
    /// Validates `options`, checks the bucket and prepares an empty session.
    ///
    /// Must be awaited inside a Tokio runtime; upload tasks are spawned onto
    /// that runtime.
    pub async fn setup(
        options: ExportOptions,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, LabelshipError> {
        options.validate()?;
        store
            .ensure_bucket()
            .await
            .map_err(LabelshipError::Bucket)?;

        info!(
            dataset = %options.dataset,
            classes = options.classes.len(),
            total_samples = options.total_samples,
            workers = options.workers,
            "export: session ready"
        );

        Ok(Self {
            uploader: Uploader::new(Arc::clone(&store), options.workers, options.upload_timeout),
            allocator: options.allocator(),
            manifest: Manifest::new(),
            pending: JoinSet::new(),
            pending_keys: HashMap::new(),
            runtime: Handle::current(),
            samples: 0,
            store,
            options,
        })
    }

    /// Dispatches the sample's upload and appends its rows.
    ///
    /// Returns without waiting for the upload. Fails only if the image has no
    /// usable object name, in which case nothing is dispatched or appended.
    pub fn export_sample(&mut self, sample: Sample) -> Result<(), LabelshipError> {
        let name = image_name(&sample.image)?;
        let key = object_key(&self.options.dataset, &name);

        let task = self.uploader.upload(sample.image, key.clone());
        let handle = self.pending.spawn_on(task, &self.runtime);

        let image = match self.options.image_ref {
            ImageRef::Key => name,
            ImageRef::Uri => self.store.uri(&key),
        };
        self.pending_keys.insert(handle.id(), key);

        let rows = build_rows(&mut self.allocator, &image, &sample.detections);
        self.manifest.extend(rows);
        self.samples += 1;
        Ok(())
    }

    /// Exports every sample of `samples` in order.
    pub fn export_all<I>(&mut self, samples: I) -> Result<(), LabelshipError>
    where
        I: IntoIterator<Item = Sample>,
    {
        for sample in samples {
            self.export_sample(sample)?;
        }
        Ok(())
    }

    /// Rows buffered so far.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn allocator(&self) -> &SplitAllocator {
        &self.allocator
    }

    /// Uploads dispatched and not yet collected.
    pub fn pending_uploads(&self) -> usize {
        self.pending.len()
    }

    /// Joins every dispatched upload, keeping a tally of how they ended.
    ///
    /// Every upload is collected even after one fails, so no task outlives
    /// the session.
    async fn collect_uploads(&mut self) -> UploadTally {
        let mut tally = UploadTally {
            total: self.pending.len(),
            ..UploadTally::default()
        };

        while let Some(joined) = self.pending.join_next_with_id().await {
            let result = match joined {
                Ok((id, result)) => {
                    self.pending_keys.remove(&id);
                    result
                }
                Err(e) => Err(LabelshipError::WorkerFailed {
                    key: self.pending_keys.remove(&e.id()).unwrap_or_default(),
                    message: e.to_string(),
                }),
            };

            match result {
                Ok(outcome) => match outcome.status {
                    UploadStatus::Uploaded => tally.uploaded += 1,
                    UploadStatus::AlreadyPresent => tally.already_present += 1,
                },
                Err(e) => {
                    error!(error = %e, "export: upload failed");
                    tally.failed += 1;
                    tally.first_failure.get_or_insert(e);
                }
            }
        }
        tally
    }

    /// Waits for all uploads, then publishes the manifest.
    ///
    /// If any upload failed, the first failure is returned and the manifest
    /// is not published.
    pub async fn finish(mut self) -> Result<ExportReport, LabelshipError> {
        let UploadTally {
            total,
            uploaded,
            already_present,
            failed,
            first_failure,
        } = self.collect_uploads().await;

        if let Some(first) = first_failure {
            return Err(LabelshipError::UploadsFailed {
                failed,
                total,
                first: Box::new(first),
            });
        }

        let key = self.options.manifest_key();
        let csv = self.manifest.to_csv_string()?;
        self.store
            .put_bytes(&key, csv.into_bytes(), "text/csv")
            .await
            .map_err(|source| LabelshipError::ManifestPublish {
                key: key.clone(),
                source,
            })?;

        let manifest_uri = self.store.uri(&key);
        info!(uri = %manifest_uri, rows = self.manifest.len(), "export: manifest published");

        Ok(ExportReport {
            dataset: self.options.dataset,
            samples: self.samples,
            rows: self.manifest.len(),
            uploaded,
            already_present,
            manifest_uri,
            total_samples: self.allocator.total_samples(),
            counters: self.allocator.into_counters(),
        })
    }
}

/// Runs a whole export: setup, every sample in order, finish.
pub async fn export<I>(
    options: ExportOptions,
    store: Arc<dyn ObjectStore>,
    samples: I,
) -> Result<ExportReport, LabelshipError>
where
    I: IntoIterator<Item = Sample>,
{
    let mut session = ExportSession::setup(options, store).await?;
    session.export_all(samples)?;
    session.finish().await
}

/// Computes the manifest an export would publish, without any storage.
///
/// The image column always holds object names.
pub fn plan<I>(options: &ExportOptions, samples: I) -> Result<Plan, LabelshipError>
where
    I: IntoIterator<Item = Sample>,
{
    options.validate()?;
    let mut allocator = options.allocator();
    let mut manifest = Manifest::new();
    let mut count = 0;

    for sample in samples {
        let name = image_name(&sample.image)?;
        manifest.extend(build_rows(&mut allocator, &name, &sample.detections));
        count += 1;
    }

    Ok(Plan {
        dataset: options.dataset.clone(),
        samples: count,
        total_samples: allocator.total_samples(),
        counters: allocator.into_counters(),
        manifest,
    })
}
