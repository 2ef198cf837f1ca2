//! Manifest rows and their CSV rendering.
//!
//! The manifest follows the tabular object-detection import layout: one row
//! per box, eleven columns, no header.
//!
//! ```text
//! TRAIN,000042.jpg,car,0.1,0.1,,,0.3,0.3,,
//! ```
//!
//! Columns are split, image, label, then four (x, y) corners. Only
//! axis-aligned boxes are produced, so the first and third corners carry the
//! box and the other two are left empty.
//!
//! # Format Limitations
//!
//! The import format allows a row with no label for an image without boxes.
//! Such samples are omitted here: an image is only listed when at least one
//! of its detections has an allowed class.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::LabelshipError;
use crate::ir::Detection;
use crate::split::{Split, SplitAllocator};

/// Object name of the manifest inside the dataset prefix.
pub const MANIFEST_FILE_NAME: &str = "labels.csv";

/// What the image column holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageRef {
    /// The object name, e.g. `000042.jpg`.
    #[default]
    Key,
    /// The canonical bucket URI, e.g. `gs://bucket/coco/000042.jpg`.
    Uri,
}

/// One box of one image.
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestRow {
    pub split: Split,
    pub image: String,
    pub label: String,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

type CsvRecord<'a> = (
    &'a str,
    &'a str,
    &'a str,
    f64,
    f64,
    &'a str,
    &'a str,
    f64,
    f64,
    &'a str,
    &'a str,
);

impl ManifestRow {
    fn record(&self) -> CsvRecord<'_> {
        (
            self.split.as_str(),
            &self.image,
            &self.label,
            self.x_min,
            self.y_min,
            "",
            "",
            self.x_max,
            self.y_max,
            "",
            "",
        )
    }
}

/// Turns the detections of one image into rows.
///
/// Each detection whose label the allocator knows gets a split and a row, in
/// input order. Other detections are skipped and leave the counters alone.
pub fn build_rows(
    allocator: &mut SplitAllocator,
    image: &str,
    detections: &[Detection],
) -> Vec<ManifestRow> {
    detections
        .iter()
        .filter_map(|det| {
            let split = allocator.assign(&det.label)?;
            Some(ManifestRow {
                split,
                image: image.to_string(),
                label: det.label.clone(),
                x_min: det.bbox.xmin(),
                y_min: det.bbox.ymin(),
                x_max: det.bbox.xmax(),
                y_max: det.bbox.ymax(),
            })
        })
        .collect()
}

/// The ordered row buffer of an export.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    rows: Vec<ManifestRow>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends rows after everything already buffered.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = ManifestRow>) {
        self.rows.extend(rows);
    }

    pub fn rows(&self) -> &[ManifestRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders the whole manifest as CSV text.
    pub fn to_csv_string(&self) -> Result<String, LabelshipError> {
        let bytes = self.write_records(Vec::new())?;
        String::from_utf8(bytes)
            .map_err(|e| LabelshipError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Writes the manifest to a local file.
    pub fn write_csv(&self, path: &Path) -> Result<(), LabelshipError> {
        let file = File::create(path).map_err(LabelshipError::Io)?;
        self.write_records(BufWriter::new(file))?
            .flush()
            .map_err(LabelshipError::Io)?;
        Ok(())
    }

    fn write_records<W: Write>(&self, writer: W) -> Result<W, LabelshipError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        for row in &self.rows {
            csv_writer.serialize(row.record())?;
        }
        csv_writer
            .into_inner()
            .map_err(|e| LabelshipError::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BBoxXYXY, Normalized};
    use crate::split::SplitFractions;

    fn det(label: &str, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Detection {
        Detection::new(label, BBoxXYXY::<Normalized>::from_xyxy(xmin, ymin, xmax, ymax))
    }

    #[test]
    fn rows_follow_detection_order_and_skip_unknown_labels() {
        let mut alloc = SplitAllocator::new(["car", "bike"], SplitFractions::default(), 10);
        let rows = build_rows(
            &mut alloc,
            "img1.png",
            &[
                det("car", 0.1, 0.1, 0.3, 0.3),
                det("tree", 0.0, 0.0, 1.0, 1.0),
                det("bike", 0.7, 0.6, 0.8, 0.9),
            ],
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "car");
        assert_eq!(rows[1].label, "bike");
        assert_eq!(rows[1].x_min, 0.7);
        assert_eq!(rows[1].y_max, 0.9);
        assert!(rows.iter().all(|r| r.image == "img1.png"));
    }

    #[test]
    fn empty_sample_has_no_rows() {
        let mut alloc = SplitAllocator::new(["car"], SplitFractions::default(), 10);
        assert!(build_rows(&mut alloc, "a.jpg", &[]).is_empty());
        assert!(build_rows(&mut alloc, "a.jpg", &[det("cat", 0.0, 0.0, 0.5, 0.5)]).is_empty());
        assert_eq!(alloc.counts("car").unwrap().total(), 0);
    }

    #[test]
    fn csv_has_eleven_columns_and_no_header() {
        let mut manifest = Manifest::new();
        manifest.extend([ManifestRow {
            split: Split::Train,
            image: "image1.png".to_string(),
            label: "car".to_string(),
            x_min: 0.1,
            y_min: 0.1,
            x_max: 0.3,
            y_max: 0.3,
        }]);

        let csv = manifest.to_csv_string().expect("csv");
        assert_eq!(csv.trim_end(), "TRAIN,image1.png,car,0.1,0.1,,,0.3,0.3,,");
    }

    #[test]
    fn labels_with_commas_are_quoted() {
        let mut manifest = Manifest::new();
        manifest.extend([ManifestRow {
            split: Split::Test,
            image: "a.jpg".to_string(),
            label: "traffic light, red".to_string(),
            x_min: 0.0,
            y_min: 0.0,
            x_max: 1.0,
            y_max: 1.0,
        }]);

        let csv = manifest.to_csv_string().expect("csv");
        assert!(csv.starts_with("TEST,a.jpg,\"traffic light, red\","));
    }

    #[test]
    fn write_csv_to_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("labels.csv");
        let mut alloc = SplitAllocator::new(["car"], SplitFractions::default(), 10);
        let mut manifest = Manifest::new();
        manifest.extend(build_rows(&mut alloc, "a.jpg", &[det("car", 0.1, 0.2, 0.3, 0.4)]));

        manifest.write_csv(&path).expect("write");
        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("TEST,a.jpg,car,"));
    }
}
