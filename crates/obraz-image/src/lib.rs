#![deny(missing_docs)]
//! Image types for generating and manipulating pixel buffers.

/// image representation for image analysis purposes.
pub mod image;

/// Error types for the image module.
pub mod error;

/// operations on whole images.
pub mod ops;

pub use crate::error::ImageError;
pub use crate::image::{Image, ImageSize};
