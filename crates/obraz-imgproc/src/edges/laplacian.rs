use obraz_image::{ops::copy_from, Image, ImageError};

use crate::{
    color::{luminance_field, GrayscaleWeights},
    filter::{
        filter2d, filter2d_field, filter2d_luminance,
        kernels::{odd_kernel_size, Kernel},
        saturate_u8, Response,
    },
    parallel,
};

/// Apply a laplacian filter with a positive centre.
///
/// Every channel receives the absolute laplacian response. Even sizes are incremented and a
/// zero `kernel_size` leaves `dst` as a copy of `src`.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_size` - The kernel size, 3 and 5 select the classic stencils.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn laplacian<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel_size: usize,
) -> Result<(), ImageError> {
    match Kernel::laplacian(kernel_size) {
        Some(kernel) => filter2d(src, dst, &kernel, Response::Absolute),
        None => copy_from(src, dst),
    }
}

/// Apply a laplacian filter with a negative centre.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn laplacian_negative<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel_size: usize,
) -> Result<(), ImageError> {
    match Kernel::laplacian_negative(kernel_size) {
        Some(kernel) => filter2d(src, dst, &kernel, Response::Absolute),
        None => copy_from(src, dst),
    }
}

/// Apply a laplacian filter and fold the channel responses into one luminance value.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn laplacian_grayscale(
    src: &Image<u8, 3>,
    dst: &mut Image<u8, 3>,
    kernel_size: usize,
    weights: GrayscaleWeights,
) -> Result<(), ImageError> {
    match Kernel::laplacian(kernel_size) {
        Some(kernel) => filter2d_luminance(src, dst, &kernel, weights),
        None => copy_from(src, dst),
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn check_size(src: &Image<u8, 3>, dst: &Image<u8, 3>) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }
    Ok(())
}

/// Compute the laplacian of gaussian of the luminance and stretch it to `[0, 255]`.
///
/// The response is min-max normalized over the whole image and written as gray to all
/// channels. A response with zero range leaves `dst` as a copy of `src`, as does a
/// non-positive `sigma`.
///
/// # Arguments
///
/// * `src` - The source RGB image.
/// * `dst` - The destination RGB image.
/// * `sigma` - Standard deviation of the gaussian, also fixes the kernel size.
/// * `weights` - Weights used to compute the luminance samples.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn laplacian_of_gaussian(
    src: &Image<u8, 3>,
    dst: &mut Image<u8, 3>,
    sigma: f64,
    weights: GrayscaleWeights,
) -> Result<(), ImageError> {
    check_size(src, dst)?;

    let Some(kernel) = Kernel::laplacian_of_gaussian(sigma) else {
        return copy_from(src, dst);
    };

    let response = filter2d_field(&luminance_field(src, weights)?, &kernel)?;

    let (lo, hi) = min_max(response.as_slice()).unwrap_or((0.0, 0.0));
    let range = hi - lo;
    if range <= 0.0 {
        log::debug!("laplacian of gaussian: flat response, image left unchanged");
        return copy_from(src, dst);
    }

    parallel::par_iter_rows(&response, dst, |resp, dst_pixel| {
        dst_pixel.fill(saturate_u8((resp[0] - lo) / range * 255.0));
    });

    Ok(())
}

/// Parameters of [`laplacian_of_gaussian_thresholded`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogThresholdConfig {
    /// Standard deviation of the gaussian.
    pub sigma: f64,
    /// Side of the local window; even sizes are incremented.
    pub window_size: usize,
    /// Fraction of the global response range a window must span to count as an edge.
    pub threshold: f64,
    /// Weights used to compute the luminance samples.
    pub weights: GrayscaleWeights,
}

impl Default for LogThresholdConfig {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            window_size: 3,
            threshold: 0.1,
            weights: GrayscaleWeights::BT601,
        }
    }
}

impl LogThresholdConfig {
    /// Set the gaussian standard deviation.
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Set the local window size.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Set the fraction of the global range used as threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the luminance weights.
    pub fn with_weights(mut self, weights: GrayscaleWeights) -> Self {
        self.weights = weights;
        self
    }
}

/// Laplacian of gaussian edge map with adaptive local thresholding.
///
/// For each pixel the spread (max - min) of the response inside a `window_size` window
/// (edge clamped) is compared against `threshold` times the global response range. Pixels
/// whose window spreads further are written as `|v - min| / range * 255`, all others as 0.
///
/// A wide local spread of the response is used as a proxy for a zero crossing; the sign
/// of the response is not inspected, so this is an approximation of the classic detector.
///
/// `sigma <= 0` or `window_size < 3` leaves `dst` as a copy of `src`.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
///
/// # Example
///
/// ```
/// use obraz_image::Image;
/// use obraz_imgproc::edges::{laplacian_of_gaussian_thresholded, LogThresholdConfig};
///
/// let src = Image::<u8, 3>::from_fn([16, 16].into(), |x, _| {
///     if x < 8 { [0, 0, 0] } else { [255, 255, 255] }
/// });
/// let mut dst = Image::<u8, 3>::from_size_val(src.size(), 0).unwrap();
///
/// laplacian_of_gaussian_thresholded(&src, &mut dst, &LogThresholdConfig::default()).unwrap();
///
/// assert!(dst.pixel(7, 8)[0] > 200);
/// assert_eq!(dst.pixel(0, 8), [0, 0, 0]);
/// ```
pub fn laplacian_of_gaussian_thresholded(
    src: &Image<u8, 3>,
    dst: &mut Image<u8, 3>,
    config: &LogThresholdConfig,
) -> Result<(), ImageError> {
    check_size(src, dst)?;

    if config.window_size < 3 {
        return copy_from(src, dst);
    }
    let Some(kernel) = Kernel::laplacian_of_gaussian(config.sigma) else {
        return copy_from(src, dst);
    };
    let window_radius = odd_kernel_size(config.window_size).unwrap_or(3) / 2;

    let response = filter2d_field(&luminance_field(src, config.weights)?, &kernel)?;

    let (lo, hi) = min_max(response.as_slice()).unwrap_or((0.0, 0.0));
    let range = hi - lo;
    let adaptive_threshold = range * config.threshold;

    let (cols, rows) = (response.cols(), response.rows());
    let resp = response.as_slice();

    parallel::par_iter_rows_indexed(dst, |x, y, dst_pixel| {
        let x0 = x.saturating_sub(window_radius);
        let x1 = (x + window_radius).min(cols - 1);
        let y0 = y.saturating_sub(window_radius);
        let y1 = (y + window_radius).min(rows - 1);

        let mut local_min = f64::INFINITY;
        let mut local_max = f64::NEG_INFINITY;
        for wy in y0..=y1 {
            for &v in &resp[wy * cols + x0..=wy * cols + x1] {
                local_min = local_min.min(v);
                local_max = local_max.max(v);
            }
        }

        let value = if range > 0.0 && local_max - local_min > adaptive_threshold {
            saturate_u8((resp[y * cols + x] - lo).abs() / range * 255.0)
        } else {
            0
        };
        dst_pixel.fill(value);
    });

    Ok(())
}
