use obraz_image::{ops::copy_from, Image, ImageError};

use crate::filter::{
    filter2d, filter2d_field, filter2d_gradient,
    kernels::{GradientOperator, Kernel},
    Response,
};

/// Apply a first order gradient operator.
///
/// Every channel receives the gradient magnitude `sqrt(Gx² + Gy²)`, rounded and saturated.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `operator` - The kernel pair to use.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
///
/// # Example
///
/// ```
/// use obraz_image::Image;
/// use obraz_imgproc::edges::gradient_filter;
/// use obraz_imgproc::filter::kernels::GradientOperator;
///
/// let src = Image::<u8, 1>::from_fn([4, 3].into(), |x, _| [if x < 2 { 0 } else { 50 }]);
/// let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0).unwrap();
///
/// gradient_filter(&src, &mut dst, GradientOperator::Sobel).unwrap();
/// assert_eq!(dst.as_slice(), &[0, 200, 200, 0, 0, 200, 200, 0, 0, 200, 200, 0]);
/// ```
pub fn gradient_filter<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    operator: GradientOperator,
) -> Result<(), ImageError> {
    let (kernel_x, kernel_y) = operator.kernels();
    filter2d_gradient(src, dst, &kernel_x, &kernel_y)
}

/// Convolve with a caller supplied matrix and keep the absolute response.
///
/// A matrix that is empty, not square or of even size leaves `dst` as a copy of `src`.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn custom_edge_filter<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    matrix: &[Vec<f64>],
) -> Result<(), ImageError> {
    match Kernel::from_matrix(matrix) {
        Some(kernel) => filter2d(src, dst, &kernel, Response::Absolute),
        None => {
            log::debug!("custom edge filter: rejected {} row matrix", matrix.len());
            copy_from(src, dst)
        }
    }
}

/// Compute the horizontal and vertical derivative fields of a real valued image.
///
/// # Returns
///
/// The `(gx, gy)` responses to the operator's kernel pair.
pub fn spatial_gradient(
    src: &Image<f64, 1>,
    operator: GradientOperator,
) -> Result<(Image<f64, 1>, Image<f64, 1>), ImageError> {
    let (kernel_x, kernel_y) = operator.kernels();
    let gx = filter2d_field(src, &kernel_x)?;
    let gy = filter2d_field(src, &kernel_y)?;
    Ok((gx, gy))
}

/// Compute gradient magnitude and orientation from derivative fields.
///
/// # Returns
///
/// The magnitude `sqrt(gx² + gy²)` and the orientation `atan2(gy, gx)` in degrees, folded
/// to `[0, 180)` since a gradient and its opposite describe the same edge.
///
/// PRECONDITION: `gx` and `gy` must have the same shape.
pub fn magnitude_direction(
    gx: &Image<f64, 1>,
    gy: &Image<f64, 1>,
) -> Result<(Image<f64, 1>, Image<f64, 1>), ImageError> {
    if gx.size() != gy.size() {
        return Err(ImageError::InvalidImageSize(
            gx.cols(),
            gx.rows(),
            gy.cols(),
            gy.rows(),
        ));
    }

    let mut magnitude = Image::from_size_val(gx.size(), 0.0)?;
    let mut direction = Image::from_size_val(gx.size(), 0.0)?;

    magnitude
        .as_slice_mut()
        .iter_mut()
        .zip(direction.as_slice_mut())
        .zip(gx.as_slice().iter().zip(gy.as_slice()))
        .for_each(|((m, d), (&gx, &gy))| {
            *m = (gx * gx + gy * gy).sqrt();
            *d = fold_orientation(gy.atan2(gx).to_degrees());
        });

    Ok((magnitude, direction))
}

/// Fold an angle in degrees into `[0, 180)`.
#[inline]
pub(crate) fn fold_orientation(degrees: f64) -> f64 {
    let folded = degrees.rem_euclid(180.0);
    if folded >= 180.0 {
        0.0
    } else {
        folded
    }
}
