//! Labelship: ship labeled detection datasets to a bucket.
//!
//! Labelship takes a stream of labeled images, uploads each image to object
//! storage exactly once per key, assigns every allowed detection to a
//! TRAIN/VALIDATE/TEST split, and publishes a single CSV manifest describing
//! the whole dataset.
//!
//! # Modules
//!
//! - [`ir`]: Samples, detections and typed bounding boxes
//! - [`split`]: Per-class split allocation
//! - [`upload`]: Idempotent, bounded-concurrency image uploads
//! - [`manifest`]: Manifest rows and CSV serialization
//! - [`export`]: The export coordinator tying it all together
//! - [`storage`]: Object storage backends
//! - [`source`]: Sample readers for the CLI
//! - [`error`]: Error types for labelship operations

pub mod error;
pub mod export;
pub mod ir;
pub mod manifest;
pub mod source;
pub mod split;
pub mod storage;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub use error::LabelshipError;

use export::ExportOptions;
use manifest::ImageRef;
use split::SplitFractions;
use storage::{DirBucket, GcsBucket, ObjectStore};

/// The labelship CLI application.
#[derive(Parser)]
#[command(name = "labelship")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Upload images and publish a split manifest to a bucket.
    Export(ExportArgs),
    /// Compute the split assignment and manifest offline, without uploading.
    Plan(PlanArgs),
}

/// Options shared by every subcommand that reads samples.
#[derive(clap::Args)]
struct SourceArgs {
    /// Input file of labeled samples.
    input: PathBuf,

    /// Input format ('jsonl' or 'tfod').
    #[arg(long, default_value = "jsonl")]
    input_format: String,

    /// Directory that relative TFOD filenames resolve against
    /// (default: the CSV's directory).
    #[arg(long)]
    image_root: Option<PathBuf>,

    /// Dataset name, used as the object prefix inside the bucket.
    #[arg(long)]
    dataset: String,

    /// Comma-separated list of allowed class labels.
    #[arg(long, value_delimiter = ',', required = true)]
    classes: Vec<String>,

    /// Train, validate and test fractions.
    #[arg(long, default_value = "0.7,0.2,0.1")]
    tvt_distribution: SplitFractions,

    /// Sample count the split quotas are computed against
    /// (default: the number of samples read).
    #[arg(long)]
    total_samples: Option<usize>,

    /// Only read the first N samples.
    #[arg(long)]
    max_samples: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    /// Google Cloud Storage.
    Gcs,
    /// A local directory laid out like a bucket.
    Dir,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ImageRefArg {
    /// The image's object name inside the dataset prefix.
    Key,
    /// The image's full storage URI.
    Uri,
}

impl From<ImageRefArg> for ImageRef {
    fn from(value: ImageRefArg) -> Self {
        match value {
            ImageRefArg::Key => ImageRef::Key,
            ImageRefArg::Uri => ImageRef::Uri,
        }
    }
}

/// Arguments for the export subcommand.
#[derive(clap::Args)]
struct ExportArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Maximum number of concurrent uploads.
    #[arg(long, default_value_t = upload::DEFAULT_WORKERS)]
    workers: usize,

    /// Fail an upload that takes longer than this many seconds.
    #[arg(long)]
    upload_timeout_secs: Option<u64>,

    /// What the manifest's image column holds.
    #[arg(long, value_enum, default_value = "key")]
    image_ref: ImageRefArg,

    /// Storage backend.
    #[arg(long, value_enum, default_value = "gcs")]
    backend: Backend,

    /// Bucket name.
    #[arg(long)]
    bucket: String,

    /// Root directory holding buckets (dir backend).
    #[arg(long, required_if_eq("backend", "dir"))]
    bucket_root: Option<PathBuf>,

    /// Storage API endpoint (gcs backend), e.g. an emulator.
    #[arg(long, default_value = storage::GCS_DEFAULT_ENDPOINT)]
    gcs_endpoint: String,

    /// OAuth2 bearer token (gcs backend).
    #[arg(long, env = "GCS_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

/// Arguments for the plan subcommand.
#[derive(clap::Args)]
struct PlanArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Write the manifest CSV to this file.
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Run the labelship CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), LabelshipError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Export(args)) => {
            init_tracing();
            run_export(args)
        }
        Some(Commands::Plan(args)) => {
            init_tracing();
            run_plan(args)
        }
        None => {
            println!("labelship {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Ship labeled detection datasets to a bucket.");
            println!();
            println!("Run 'labelship --help' for usage information.");
            Ok(())
        }
    }
}

/// Logs go to stderr; stdout carries the report.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

impl SourceArgs {
    fn read(&self) -> Result<(ExportOptions, Vec<ir::Sample>), LabelshipError> {
        let samples = source::read_samples(
            &self.input,
            &self.input_format,
            self.image_root.as_deref(),
            self.max_samples,
        )?;
        info!(count = samples.len(), input = %self.input.display(), "read samples");

        let classes = self
            .classes
            .iter()
            .map(|c| c.trim().to_string())
            .collect();
        let total = self.total_samples.unwrap_or(samples.len());

        let mut options = ExportOptions::new(self.dataset.clone(), classes, total);
        options.fractions = self.tvt_distribution;
        Ok((options, samples))
    }
}

/// Execute the export subcommand.
fn run_export(args: ExportArgs) -> Result<(), LabelshipError> {
    let (mut options, samples) = args.source.read()?;
    options.workers = args.workers;
    options.upload_timeout = args.upload_timeout_secs.map(Duration::from_secs);
    options.image_ref = args.image_ref.into();

    let store: Arc<dyn ObjectStore> = match args.backend {
        Backend::Gcs => Arc::new(
            GcsBucket::with_endpoint(&args.gcs_endpoint, args.bucket, args.access_token)
                .map_err(LabelshipError::Bucket)?,
        ),
        Backend::Dir => {
            let root = args.bucket_root.ok_or_else(|| LabelshipError::InvalidConfig {
                message: "--bucket-root is required with --backend dir".to_string(),
            })?;
            Arc::new(DirBucket::new(root, args.bucket))
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(export::export(options, store, samples))?;

    print!("{}", report);
    Ok(())
}

/// Execute the plan subcommand.
fn run_plan(args: PlanArgs) -> Result<(), LabelshipError> {
    let (options, samples) = args.source.read()?;
    let planned = export::plan(&options, samples)?;

    if let Some(path) = &args.output {
        planned.manifest.write_csv(path)?;
        info!(path = %path.display(), rows = planned.manifest.len(), "manifest written");
    }

    print!("{}", planned);
    Ok(())
}
