use crate::{Image, ImageError};

/// Cast the pixel data of an image to a different type.
///
/// # Arguments
///
/// * `src` - The source image.
/// * `dst` - The destination image.
/// * `scale` - The scale to multiply the pixel data with.
///
/// Example:
///
/// ```
/// use obraz_image::{Image, ImageSize};
/// use obraz_image::ops::cast_and_scale;
///
/// let image = Image::<u8, 1>::new(
///   ImageSize {
///     width: 2,
///     height: 1,
///   },
///   vec![0u8, 255],
/// ).unwrap();
///
/// let mut image_f64 = Image::from_size_val(image.size(), 0.0f64).unwrap();
///
/// cast_and_scale(&image, &mut image_f64, 1. / 255.0).unwrap();
///
/// assert_eq!(image_f64.get_pixel(0, 0, 0).unwrap(), &0.0f64);
/// assert_eq!(image_f64.get_pixel(1, 0, 0).unwrap(), &1.0f64);
/// ```
pub fn cast_and_scale<T, U, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<U, C>,
    scale: U,
) -> Result<(), ImageError>
where
    T: Copy + num_traits::NumCast,
    U: Copy + num_traits::NumCast + std::ops::Mul<U, Output = U>,
{
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
        ));
    }

    dst.as_slice_mut()
        .iter_mut()
        .zip(src.as_slice().iter())
        .try_for_each(|(out, &inp)| {
            let x = U::from(inp).ok_or(ImageError::CastError(
                std::any::type_name::<U>().to_string(),
            ))?;
            *out = x * scale;
            Ok::<(), ImageError>(())
        })?;

    Ok(())
}

/// Copy the pixel data of `src` into `dst`.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn copy_from<T: Copy, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
        ));
    }

    dst.as_slice_mut().copy_from_slice(src.as_slice());

    Ok(())
}
