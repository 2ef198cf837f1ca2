//! Samples as they flow through an export.
//!
//! A [`Sample`] is consumed once by the export session and never stored: its
//! image moves into an upload task, its detections become manifest rows.

use std::path::PathBuf;

use super::bbox::BBoxXYXY;
use super::space::Normalized;
use crate::error::LabelshipError;

/// One labeled image from the input stream.
#[derive(Clone, Debug)]
pub struct Sample {
    pub image: ImageSource,
    pub detections: Vec<Detection>,
}

impl Sample {
    pub fn new(image: impl Into<ImageSource>, detections: Vec<Detection>) -> Self {
        Self {
            image: image.into(),
            detections,
        }
    }
}

/// Where a sample's image bytes come from.
#[derive(Clone, Debug)]
pub enum ImageSource {
    /// A file on disk, uploaded as-is under its file name.
    Path(PathBuf),
    /// Decoded pixels, JPEG-encoded at upload time under a content-hash name.
    Pixels(PixelBuffer),
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&str> for ImageSource {
    fn from(path: &str) -> Self {
        ImageSource::Path(PathBuf::from(path))
    }
}

impl From<PixelBuffer> for ImageSource {
    fn from(buffer: PixelBuffer) -> Self {
        ImageSource::Pixels(buffer)
    }
}

/// Channel layout of a [`PixelBuffer`], 8 bits per channel, row-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Gray8,
    Rgb8,
    Rgba8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray8 => 1,
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }
}

/// A raw, tightly packed pixel array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps `data`, checking that its length matches the dimensions.
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: Vec<u8>,
    ) -> Result<Self, LabelshipError> {
        let expected = width as usize * height as usize * layout.channels();
        if width == 0 || height == 0 || data.len() != expected {
            return Err(LabelshipError::InvalidPixelBuffer {
                message: format!(
                    "{}x{} {:?} needs {} bytes, got {}",
                    width,
                    height,
                    layout,
                    expected,
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// The raw bytes; this is what the object key is hashed from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// One labeled box inside a sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    pub bbox: BBoxXYXY<Normalized>,
}

impl Detection {
    pub fn new(label: impl Into<String>, bbox: BBoxXYXY<Normalized>) -> Self {
        Self {
            label: label.into(),
            bbox,
        }
    }
}
