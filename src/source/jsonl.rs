//! JSON Lines sample reader.
//!
//! One sample per line:
//!
//! ```text
//! {"image": "images/0001.jpg", "detections": [{"label": "car", "bbox": [0.1, 0.1, 0.3, 0.3]}]}
//! ```
//!
//! A detection's box may be given in one of three shapes:
//!
//! - `bbox`: normalized `[xmin, ymin, xmax, ymax]`
//! - `bounding_box`: normalized `[x, y, width, height]` (FiftyOne's layout)
//! - `bbox_px`: pixel `[xmin, ymin, xmax, ymax]`; the sample must then carry
//!   `width` and `height`
//!
//! Detections without a label or without any box are dropped. Relative image
//! paths are resolved against `base_dir`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::LabelshipError;
use crate::ir::{BBoxXYXY, Detection, Normalized, Pixel, Sample};

#[derive(Debug, Deserialize)]
struct SampleLine {
    image: PathBuf,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    detections: Vec<DetectionLine>,
}

#[derive(Debug, Deserialize)]
struct DetectionLine {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    bbox: Option<[f64; 4]>,
    #[serde(default)]
    bounding_box: Option<[f64; 4]>,
    #[serde(default)]
    bbox_px: Option<[f64; 4]>,
}

/// Reads samples from a JSON Lines file.
pub fn read_jsonl_samples(path: &Path) -> Result<Vec<Sample>, LabelshipError> {
    let file = File::open(path).map_err(LabelshipError::Io)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    parse_lines(BufReader::new(file), path, base_dir)
}

/// Reads samples from JSON Lines text.
pub fn from_jsonl_str(text: &str, base_dir: &Path) -> Result<Vec<Sample>, LabelshipError> {
    parse_lines(text.as_bytes(), Path::new("<string>"), base_dir)
}

fn parse_lines<R: BufRead>(
    reader: R,
    path: &Path,
    base_dir: &Path,
) -> Result<Vec<Sample>, LabelshipError> {
    let mut samples = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(LabelshipError::Io)?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed: SampleLine =
            serde_json::from_str(&line).map_err(|source| LabelshipError::SourceJsonParse {
                path: path.to_path_buf(),
                line: i + 1,
                source,
            })?;
        samples.push(to_sample(parsed, path, i + 1, base_dir)?);
    }

    Ok(samples)
}

fn to_sample(
    line: SampleLine,
    path: &Path,
    line_no: usize,
    base_dir: &Path,
) -> Result<Sample, LabelshipError> {
    let mut detections = Vec::with_capacity(line.detections.len());

    for det in line.detections {
        let Some(label) = det.label else { continue };

        let bbox: BBoxXYXY<Normalized> = if let Some([xmin, ymin, xmax, ymax]) = det.bbox {
            BBoxXYXY::from_xyxy(xmin, ymin, xmax, ymax)
        } else if let Some([x, y, w, h]) = det.bounding_box {
            BBoxXYXY::from_xywh(x, y, w, h)
        } else if let Some([xmin, ymin, xmax, ymax]) = det.bbox_px {
            let (Some(width), Some(height)) = (line.width, line.height) else {
                return Err(LabelshipError::SourceInvalid {
                    path: path.to_path_buf(),
                    message: format!(
                        "line {line_no}: 'bbox_px' needs the sample's width and height"
                    ),
                });
            };
            BBoxXYXY::<Pixel>::from_xyxy(xmin, ymin, xmax, ymax)
                .to_normalized(width as f64, height as f64)
        } else {
            continue;
        };

        detections.push(Detection::new(label, bbox));
    }

    let image = if line.image.is_relative() {
        base_dir.join(&line.image)
    } else {
        line.image
    };

    Ok(Sample::new(image, detections))
}
