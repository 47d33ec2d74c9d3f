//! Filter operations
//!
//! Square kernel convolution over 8-bit images and real valued fields, with a replicated
//! border, plus the kernel generators and the blurs built on them.

/// Filter kernels
pub mod kernels;

mod convolution;
pub use convolution::*;

/// Filter operations
mod ops;
pub use ops::*;

/// Round and saturate a real value to the 8-bit range.
///
/// NaN maps to 0.
///
/// # Example
///
/// ```
/// use obraz_imgproc::filter::saturate_u8;
///
/// assert_eq!(saturate_u8(-3.2), 0);
/// assert_eq!(saturate_u8(127.5), 128);
/// assert_eq!(saturate_u8(1e9), 255);
/// ```
#[inline]
pub fn saturate_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
