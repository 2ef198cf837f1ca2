//! Sample sources for the CLI.
//!
//! The library accepts any iterator of [`Sample`]s; these readers turn common
//! annotation files into one.

pub mod jsonl;
pub mod tfod_csv;

use std::path::Path;

use tracing::warn;

use crate::error::LabelshipError;
use crate::ir::Sample;

/// Reads samples from `path` in the named format (`jsonl` or `tfod`).
///
/// `image_root` overrides where relative image paths resolve (TFOD only;
/// JSON Lines paths resolve against the file's own directory). At most
/// `max_samples` samples are returned.
pub fn read_samples(
    path: &Path,
    format: &str,
    image_root: Option<&Path>,
    max_samples: Option<usize>,
) -> Result<Vec<Sample>, LabelshipError> {
    let mut samples = match format {
        "jsonl" | "json-lines" => jsonl::read_jsonl_samples(path)?,
        "tfod" | "tfod-csv" => tfod_csv::read_tfod_samples(path, image_root)?,
        other => {
            return Err(LabelshipError::UnsupportedFormat(format!(
                "'{}' (supported: jsonl, tfod)",
                other
            )));
        }
    };

    if let Some(max) = max_samples {
        samples.truncate(max);
    }

    let outside = samples
        .iter()
        .flat_map(|s| &s.detections)
        .filter(|d| !d.bbox.is_within_unit())
        .count();
    if outside > 0 {
        warn!(count = outside, path = %path.display(), "boxes outside [0, 1]; exported as-is");
    }

    Ok(samples)
}
