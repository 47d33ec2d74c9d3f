use obraz_image::{ops::copy_from, Image, ImageError};

use super::{filter2d, kernels::Kernel, Response};

/// Blur an image using a gaussian blur filter
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `sigma` - The sigma of the gaussian kernel.
/// * `kernel_size` - The size of the kernel, derived from `sigma` when `None`.
///
/// A non-positive `sigma` or a zero `kernel_size` leaves `dst` as a copy of `src`.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
///
/// # Example
///
/// ```
/// use obraz_image::Image;
/// use obraz_imgproc::filter::gaussian_blur;
///
/// let mut src = Image::<u8, 1>::from_size_val([5, 5].into(), 0).unwrap();
/// src.set_pixel(2, 2, [255]);
///
/// let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0).unwrap();
/// gaussian_blur(&src, &mut dst, 1.0, Some(3)).unwrap();
///
/// assert!(dst.pixel(2, 2)[0] < 255);
/// assert!(dst.pixel(1, 2)[0] > 0);
/// ```
pub fn gaussian_blur<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    sigma: f64,
    kernel_size: Option<usize>,
) -> Result<(), ImageError> {
    let kernel = match kernel_size {
        Some(size) => Kernel::gaussian_with_size(sigma, size),
        None => Kernel::gaussian(sigma),
    };

    match kernel {
        Some(kernel) => filter2d(src, dst, &kernel, Response::Signed),
        None => copy_from(src, dst),
    }
}

/// Blur an image using a box blur filter
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_size` - The side length of the box; even sizes are incremented.
///
/// A zero `kernel_size` leaves `dst` as a copy of `src`.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn box_blur<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel_size: usize,
) -> Result<(), ImageError> {
    match Kernel::uniform(kernel_size) {
        Some(kernel) => filter2d(src, dst, &kernel, Response::Signed),
        None => copy_from(src, dst),
    }
}
