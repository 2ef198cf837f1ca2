use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::storage::StorageError;

/// The main error type for labelship operations.
#[derive(Debug, Error)]
pub enum LabelshipError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to parse sample on line {line} of {path}: {source}")]
    SourceJsonParse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse TFOD CSV from {path}: {source}")]
    SourceCsvParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid sample source {path}: {message}")]
    SourceInvalid { path: PathBuf, message: String },

    #[error("Invalid pixel buffer: {message}")]
    InvalidPixelBuffer { message: String },

    #[error("Image path {path} has no file name to use as an object key")]
    MissingFileName { path: PathBuf },

    #[error("Bucket check failed: {0}")]
    Bucket(#[source] StorageError),

    #[error("Storage operation on '{key}' failed: {source}")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to encode '{key}' as JPEG: {source}")]
    Encode {
        key: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Upload of '{key}' timed out after {limit:?}")]
    UploadTimeout { key: String, limit: Duration },

    #[error("Upload worker for '{key}' failed: {message}")]
    WorkerFailed { key: String, message: String },

    #[error("{failed} of {total} upload(s) failed; manifest not published. First failure: {first}")]
    UploadsFailed {
        failed: usize,
        total: usize,
        #[source]
        first: Box<LabelshipError>,
    },

    #[error("Failed to serialize manifest: {0}")]
    ManifestWrite(#[from] csv::Error),

    #[error("Failed to publish manifest '{key}': {source}")]
    ManifestPublish {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
