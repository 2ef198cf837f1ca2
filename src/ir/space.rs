//! Coordinate space markers.
//!
//! Zero-sized types used as the `TSpace` parameter of
//! [`BBoxXYXY`](super::BBoxXYXY) so that pixel boxes cannot reach the
//! manifest without being normalized first.

use std::fmt;

/// Absolute pixel coordinates, origin at the top-left corner.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Image-relative coordinates in `[0, 1]`.
///
/// This is the only space the manifest accepts.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalized {}

impl fmt::Debug for Pixel {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl fmt::Debug for Normalized {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}
