use obraz_image::{Image, ImageError};

use super::{kernels::Kernel, saturate_u8};
use crate::{color::GrayscaleWeights, parallel};

/// How the raw kernel sum is turned into an output sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Response {
    /// Keep the sign, so negative responses saturate to 0. Used for smoothing.
    #[default]
    Signed,
    /// Take the absolute value first. Used for edge responses.
    Absolute,
}

impl Response {
    #[inline]
    fn apply(self, v: f64) -> f64 {
        match self {
            Response::Signed => v,
            Response::Absolute => v.abs(),
        }
    }
}

/// Clamp `v + offset - radius` to `[0, len)`.
#[inline]
fn replicate(v: usize, offset: usize, radius: usize, len: usize) -> usize {
    (v + offset).saturating_sub(radius).min(len - 1)
}

/// Weighted sum of the neighbourhood of `(x, y)`, per channel, with a replicated border.
#[inline]
fn convolve_pixel<T, const C: usize>(
    src: &Image<T, C>,
    kernel: &Kernel,
    x: usize,
    y: usize,
) -> [f64; C]
where
    T: Copy + Into<f64>,
{
    let (cols, rows) = (src.cols(), src.rows());
    let radius = kernel.radius();
    let src_data = src.as_slice();

    let mut acc = [0.0; C];
    for ky in 0..kernel.size() {
        let sy = replicate(y, ky, radius, rows);
        for kx in 0..kernel.size() {
            let sx = replicate(x, kx, radius, cols);
            let w = kernel.get(kx, ky);
            let offset = (sy * cols + sx) * C;
            for (a, &s) in acc.iter_mut().zip(&src_data[offset..offset + C]) {
                *a += w * s.into();
            }
        }
    }
    acc
}

fn check_size<T1, T2, const C1: usize, const C2: usize>(
    src: &Image<T1, C1>,
    dst: &Image<T2, C2>,
) -> Result<(), ImageError> {
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

/// Convolve an 8-bit image with a square kernel.
///
/// Each output sample is the kernel weighted sum over the neighbourhood centred on the
/// pixel, converted by `response`, rounded and saturated to `[0, 255]`. Coordinates that
/// fall outside the image are clamped to the nearest edge pixel.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel` - The convolution kernel.
/// * `response` - Whether negative sums are kept or folded to their magnitude.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
///
/// # Example
///
/// ```
/// use obraz_image::Image;
/// use obraz_imgproc::filter::{filter2d, kernels::Kernel, Response};
///
/// let src = Image::<u8, 1>::from_size_val([4, 4].into(), 42).unwrap();
/// let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0).unwrap();
///
/// let kernel = Kernel::uniform(3).unwrap();
/// filter2d(&src, &mut dst, &kernel, Response::Signed).unwrap();
/// assert_eq!(dst, src);
/// ```
pub fn filter2d<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel: &Kernel,
    response: Response,
) -> Result<(), ImageError> {
    check_size(src, dst)?;

    parallel::par_iter_rows_indexed(dst, |x, y, dst_pixel| {
        let acc = convolve_pixel(src, kernel, x, y);
        dst_pixel
            .iter_mut()
            .zip(acc)
            .for_each(|(d, v)| *d = saturate_u8(response.apply(v)));
    });

    Ok(())
}

/// Convolve an 8-bit image with a gradient kernel pair.
///
/// Every channel receives `sqrt(Gx² + Gy²)`, rounded and saturated, where `Gx` and `Gy` are
/// the responses to `kernel_x` and `kernel_y`.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn filter2d_gradient<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel_x: &Kernel,
    kernel_y: &Kernel,
) -> Result<(), ImageError> {
    check_size(src, dst)?;

    parallel::par_iter_rows_indexed(dst, |x, y, dst_pixel| {
        let gx = convolve_pixel(src, kernel_x, x, y);
        let gy = convolve_pixel(src, kernel_y, x, y);
        for ((d, gx), gy) in dst_pixel.iter_mut().zip(gx).zip(gy) {
            *d = saturate_u8((gx * gx + gy * gy).sqrt());
        }
    });

    Ok(())
}

/// Convolve an RGB8 image and fold the per channel magnitudes into one luminance value.
///
/// The absolute response of each channel is weighted with `weights`; the result is
/// written to all three output channels.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn filter2d_luminance(
    src: &Image<u8, 3>,
    dst: &mut Image<u8, 3>,
    kernel: &Kernel,
    weights: GrayscaleWeights,
) -> Result<(), ImageError> {
    check_size(src, dst)?;

    parallel::par_iter_rows_indexed(dst, |x, y, dst_pixel| {
        let [r, g, b] = convolve_pixel(src, kernel, x, y);
        dst_pixel.fill(saturate_u8(weights.luminance(r.abs(), g.abs(), b.abs())));
    });

    Ok(())
}

/// Convolve a real valued single channel field.
///
/// Same sampling as [`filter2d`] but the sums are returned unrounded and unclamped.
///
/// # Errors
///
/// Only fails if the output buffer cannot be allocated for the source size.
pub fn filter2d_field(src: &Image<f64, 1>, kernel: &Kernel) -> Result<Image<f64, 1>, ImageError> {
    let mut dst = Image::from_size_val(src.size(), 0.0)?;

    parallel::par_iter_rows_indexed(&mut dst, |x, y, dst_pixel| {
        dst_pixel[0] = convolve_pixel(src, kernel, x, y)[0];
    });

    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::kernels::GradientOperator;
    use approx::assert_relative_eq;

    fn impulse(value: u8, center: u8) -> Result<Image<u8, 1>, ImageError> {
        let mut image = Image::<u8, 1>::from_size_val([5, 5].into(), value)?;
        image.set_pixel(2, 2, [center]);
        Ok(image)
    }

    #[test]
    fn test_constant_image_is_fixed_point() -> Result<(), ImageError> {
        let src = Image::<u8, 3>::from_size_val([7, 5].into(), 123)?;
        let mut dst = Image::<u8, 3>::from_size_val(src.size(), 0)?;

        for kernel in [
            Kernel::uniform(3),
            Kernel::uniform(5),
            Kernel::gaussian(1.0),
            Kernel::gaussian(2.5),
        ]
        .into_iter()
        .flatten()
        {
            filter2d(&src, &mut dst, &kernel, Response::Signed)?;
            assert_eq!(dst, src);
        }

        Ok(())
    }

    #[test]
    fn test_replicate_border() -> Result<(), ImageError> {
        // a bright left column stays bright at the border
        let src = Image::<u8, 1>::from_fn([4, 3].into(), |x, _| [if x == 0 { 90 } else { 0 }]);
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;

        let kernel = Kernel::uniform(3).unwrap();
        filter2d(&src, &mut dst, &kernel, Response::Signed)?;

        // at x = 0 the window sees columns -1 (clamped to 0), 0 and 1
        assert_eq!(dst.pixel(0, 1), [60]);
        assert_eq!(dst.pixel(1, 1), [30]);
        assert_eq!(dst.pixel(2, 1), [0]);
        assert_eq!(dst.pixel(0, 0), [60]);

        Ok(())
    }

    #[test]
    fn test_signed_and_absolute_response() -> Result<(), ImageError> {
        let src = impulse(0, 50)?;
        let mut signed = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        let mut absolute = Image::<u8, 1>::from_size_val(src.size(), 0)?;

        let kernel = Kernel::laplacian(3).unwrap();
        filter2d(&src, &mut signed, &kernel, Response::Signed)?;
        filter2d(&src, &mut absolute, &kernel, Response::Absolute)?;

        assert_eq!(signed.pixel(2, 2), [200]);
        assert_eq!(absolute.pixel(2, 2), [200]);

        // the ring responds with -50
        assert_eq!(signed.pixel(2, 1), [0]);
        assert_eq!(absolute.pixel(2, 1), [50]);
        assert_eq!(absolute.pixel(1, 1), [0]);

        Ok(())
    }

    #[test]
    fn test_output_saturates() -> Result<(), ImageError> {
        let src = impulse(0, 255)?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;

        let kernel = Kernel::laplacian(5).unwrap();
        filter2d(&src, &mut dst, &kernel, Response::Absolute)?;
        assert_eq!(dst.pixel(2, 2), [255]);

        Ok(())
    }

    #[test]
    fn test_gradient_on_impulse() -> Result<(), ImageError> {
        let src = impulse(100, 200)?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;

        let (kx, ky) = GradientOperator::Sobel.kernels();
        filter2d_gradient(&src, &mut dst, &kx, &ky)?;

        assert_eq!(dst.pixel(2, 2), [0]);
        for (x, y) in [(1, 2), (3, 2), (2, 1), (2, 3)] {
            assert_eq!(dst.pixel(x, y), [200]);
        }
        for (x, y) in [(1, 1), (3, 1), (1, 3), (3, 3)] {
            assert_eq!(dst.pixel(x, y), [141]);
        }
        for (x, y) in [(0, 0), (4, 4), (0, 2), (2, 4)] {
            assert_eq!(dst.pixel(x, y), [0]);
        }

        Ok(())
    }

    #[test]
    fn test_luminance_variant() -> Result<(), ImageError> {
        let mut src = Image::<u8, 3>::from_size_val([3, 3].into(), 0)?;
        src.set_pixel(1, 1, [10, 20, 30]);
        let mut dst = Image::<u8, 3>::from_size_val(src.size(), 0)?;

        let kernel = Kernel::laplacian(3).unwrap();
        filter2d_luminance(&src, &mut dst, &kernel, GrayscaleWeights::EDITOR)?;

        // 4 * (0.3 * 10 + 0.6 * 20 + 0.1 * 30)
        assert_eq!(dst.pixel(1, 1), [72, 72, 72]);
        assert_eq!(dst.pixel(1, 0), [18, 18, 18]);
        assert_eq!(dst.pixel(0, 0), [0, 0, 0]);

        Ok(())
    }

    #[test]
    fn test_field_convolution() -> Result<(), ImageError> {
        let src = Image::<f64, 1>::from_fn([3, 1].into(), |x, _| [x as f64]);

        let (kx, _) = GradientOperator::Sobel.kernels();
        let gx = filter2d_field(&src, &kx)?;

        // every row is identical after the vertical clamp: (1 + 2 + 1) * (x+1 - x-1)
        assert_relative_eq!(gx.as_slice()[0], 4.0);
        assert_relative_eq!(gx.as_slice()[1], 8.0);
        assert_relative_eq!(gx.as_slice()[2], 4.0);

        Ok(())
    }

    #[test]
    fn test_size_mismatch() -> Result<(), ImageError> {
        let src = Image::<u8, 1>::from_size_val([3, 3].into(), 0)?;
        let mut dst = Image::<u8, 1>::from_size_val([3, 4].into(), 7)?;

        let kernel = Kernel::uniform(3).unwrap();
        assert_eq!(
            filter2d(&src, &mut dst, &kernel, Response::Signed),
            Err(ImageError::InvalidImageSize(3, 3, 3, 4))
        );
        assert!(dst.as_slice().iter().all(|&v| v == 7));

        Ok(())
    }
}
