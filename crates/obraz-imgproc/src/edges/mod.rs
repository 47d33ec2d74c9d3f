//! Edge detection
//!
//! Laplacian family filters (plain, negated, luminance folded, laplacian of gaussian) and
//! first order gradient operators, plus the real valued gradient helpers used by
//! [`crate::canny`].

mod gradient;
pub use gradient::*;

mod laplacian;
pub use laplacian::*;
