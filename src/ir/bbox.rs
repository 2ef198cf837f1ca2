//! Axis-aligned bounding boxes tagged with their coordinate space.

use std::fmt;
use std::marker::PhantomData;

use super::{Normalized, Pixel};

/// An axis-aligned box stored as its two corners (xmin, ymin) and (xmax, ymax).
///
/// The manifest only supports rectangles, so two corners are all a detection
/// ever carries. Construction does not check ordering or range: sources hand
/// over whatever the labeler produced and the manifest reproduces it.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYXY<TSpace> {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYXY<TSpace> {
    /// Creates a box from its two corners.
    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            _space: PhantomData,
        }
    }

    /// Creates a box from a top-left corner plus width and height.
    ///
    /// FiftyOne stores detections this way.
    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::from_xyxy(x, y, x + width, y + height)
    }

    #[inline]
    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    #[inline]
    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    #[inline]
    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    #[inline]
    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    /// Returns true if all four coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite()
            && self.ymin.is_finite()
            && self.xmax.is_finite()
            && self.ymax.is_finite()
    }
}

impl BBoxXYXY<Pixel> {
    /// Divides by the image dimensions to get image-relative coordinates.
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> BBoxXYXY<Normalized> {
        BBoxXYXY::from_xyxy(
            self.xmin / image_width,
            self.ymin / image_height,
            self.xmax / image_width,
            self.ymax / image_height,
        )
    }
}

impl BBoxXYXY<Normalized> {
    /// Returns true if every coordinate lies in `[0, 1]`.
    pub fn is_within_unit(&self) -> bool {
        [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }
}

impl<TSpace> fmt::Debug for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BBoxXYXY")
            .field("xmin", &self.xmin)
            .field("ymin", &self.ymin)
            .field("xmax", &self.xmax)
            .field("ymax", &self.ymax)
            .finish()
    }
}
