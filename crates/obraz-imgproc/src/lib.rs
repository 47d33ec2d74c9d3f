#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// staged canny edge detector.
pub mod canny;

/// color transformations module.
pub mod color;

/// utilities to draw on images.
pub mod draw;

/// edge detection filters.
pub mod edges;

/// image enhancement module.
pub mod enhance;

/// image filtering module.
pub mod filter;

/// compute image histogram module.
pub mod histogram;

/// hough line transform module.
pub mod hough;

/// module containing parallization utilities.
pub mod parallel;

/// operations to threshold images.
pub mod threshold;

/// watershed segmentation module.
pub mod watershed;
