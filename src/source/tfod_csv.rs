//! TFOD CSV sample reader.
//!
//! Reads the TensorFlow Object Detection CSV layout that most labeling tools
//! can export:
//!
//! ```text
//! filename,width,height,class,xmin,ymin,xmax,ymax
//! image001.jpg,640,480,person,0.1,0.2,0.5,0.8
//! ```
//!
//! Coordinates are already normalized. Rows are grouped into one sample per
//! filename, in order of first appearance, with detections in row order.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::LabelshipError;
use crate::ir::{BBoxXYXY, Detection, Normalized, Sample};

#[derive(Debug, Deserialize)]
struct TfodRow {
    filename: String,
    width: u32,
    height: u32,
    #[serde(rename = "class")]
    class_name: String,
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

/// Reads samples from a TFOD CSV file.
///
/// Relative filenames resolve against `image_root`, or the CSV's own
/// directory when no root is given.
pub fn read_tfod_samples(
    path: &Path,
    image_root: Option<&Path>,
) -> Result<Vec<Sample>, LabelshipError> {
    let file = File::open(path).map_err(LabelshipError::Io)?;
    let root = image_root
        .or_else(|| path.parent())
        .unwrap_or_else(|| Path::new(""));
    parse_rows(BufReader::new(file), path, root)
}

/// Reads samples from TFOD CSV text.
pub fn from_tfod_csv_str(text: &str, image_root: &Path) -> Result<Vec<Sample>, LabelshipError> {
    parse_rows(text.as_bytes(), Path::new("<string>"), image_root)
}

fn parse_rows<R: Read>(
    reader: R,
    path: &Path,
    root: &Path,
) -> Result<Vec<Sample>, LabelshipError> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let mut order: Vec<String> = Vec::new();
    let mut by_file: HashMap<String, ((u32, u32), Vec<Detection>)> = HashMap::new();

    for result in csv_reader.deserialize() {
        let row: TfodRow = result.map_err(|source| LabelshipError::SourceCsvParse {
            path: path.to_path_buf(),
            source,
        })?;

        let detection = Detection::new(
            row.class_name,
            BBoxXYXY::<Normalized>::from_xyxy(row.xmin, row.ymin, row.xmax, row.ymax),
        );

        match by_file.get_mut(&row.filename) {
            Some(((w, h), detections)) => {
                // Same filename should have same dimensions
                if (*w, *h) != (row.width, row.height) {
                    return Err(LabelshipError::SourceInvalid {
                        path: path.to_path_buf(),
                        message: format!(
                            "Inconsistent dimensions for '{}': ({}, {}) vs ({}, {})",
                            row.filename, w, h, row.width, row.height
                        ),
                    });
                }
                detections.push(detection);
            }
            None => {
                order.push(row.filename.clone());
                by_file.insert(row.filename, ((row.width, row.height), vec![detection]));
            }
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|filename| {
            let (_, detections) = by_file.remove(&filename)?;
            let file = PathBuf::from(&filename);
            let image = if file.is_relative() {
                root.join(file)
            } else {
                file
            };
            Some(Sample::new(image, detections))
        })
        .collect())
}
