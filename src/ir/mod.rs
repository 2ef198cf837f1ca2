//! Sample types shared by the sources, the row builder and the uploader.
//!
//! Boxes carry their coordinate space in the type, so a pixel-space box from a
//! labeler has to go through [`BBoxXYXY::to_normalized`] before it can become a
//! [`Detection`].
//!
//! # Example
//!
//! ```
//! use labelship::ir::{BBoxXYXY, Detection, Normalized, Sample};
//!
//! let sample = Sample::new(
//!     "images/0001.jpg",
//!     vec![Detection::new(
//!         "car",
//!         BBoxXYXY::<Normalized>::from_xyxy(0.1, 0.1, 0.3, 0.3),
//!     )],
//! );
//! assert_eq!(sample.detections.len(), 1);
//! ```

mod bbox;
mod model;
mod space;

pub use bbox::BBoxXYXY;
pub use model::{Detection, ImageSource, PixelBuffer, PixelLayout, Sample};
pub use space::{Normalized, Pixel};
