use obraz_image::{Image, ImageError};

use crate::{filter::saturate_u8, parallel};

/// Channel weights used to fold an RGB triple into one luminance value.
///
/// Every operation that needs luminance takes its weights explicitly (or from its
/// configuration struct), so a single pipeline never mixes two weightings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GrayscaleWeights {
    /// Weight of the red channel.
    pub r: f64,
    /// Weight of the green channel.
    pub g: f64,
    /// Weight of the blue channel.
    pub b: f64,
}

impl GrayscaleWeights {
    /// Y = 0.3 * R + 0.6 * G + 0.1 * B, the editor weighting and the default.
    pub const EDITOR: Self = Self {
        r: 0.3,
        g: 0.6,
        b: 0.1,
    };

    /// Y = 0.299 * R + 0.587 * G + 0.114 * B (ITU-R BT.601).
    pub const BT601: Self = Self {
        r: 0.299,
        g: 0.587,
        b: 0.114,
    };

    /// Luminance of an RGB triple, not rounded.
    #[inline]
    pub fn luminance(&self, r: f64, g: f64, b: f64) -> f64 {
        self.r * r + self.g * g + self.b * b
    }

    /// Luminance of an 8-bit RGB pixel, rounded and saturated.
    #[inline]
    pub fn luminance_u8(&self, px: &[u8]) -> u8 {
        saturate_u8(self.luminance(px[0] as f64, px[1] as f64, px[2] as f64))
    }
}

impl Default for GrayscaleWeights {
    fn default() -> Self {
        Self::EDITOR
    }
}

/// Convert an RGB8 image to a single channel grayscale image.
///
/// # Arguments
///
/// * `src` - The input RGB image.
/// * `dst` - The output grayscale image.
/// * `weights` - The channel weights.
///
/// Precondition: the input and output images must have the same size.
///
/// # Example
///
/// ```
/// use obraz_image::{Image, ImageSize};
/// use obraz_imgproc::color::{gray_from_rgb, GrayscaleWeights};
///
/// let image = Image::<u8, 3>::new(
///     ImageSize {
///         width: 2,
///         height: 1,
///     },
///     vec![255, 255, 255, 100, 0, 0],
/// )
/// .unwrap();
///
/// let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0).unwrap();
///
/// gray_from_rgb(&image, &mut gray, GrayscaleWeights::EDITOR).unwrap();
/// assert_eq!(gray.as_slice(), &[255, 30]);
/// ```
pub fn gray_from_rgb(
    src: &Image<u8, 3>,
    dst: &mut Image<u8, 1>,
    weights: GrayscaleWeights,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    // parallelize the grayscale conversion by rows
    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        dst_pixel[0] = weights.luminance_u8(src_pixel);
    });

    Ok(())
}

/// Compute the unrounded luminance of every pixel of an RGB8 image.
///
/// # Errors
///
/// Only fails if the output buffer cannot be allocated for the source size.
pub fn luminance_field(
    src: &Image<u8, 3>,
    weights: GrayscaleWeights,
) -> Result<Image<f64, 1>, ImageError> {
    let mut dst = Image::from_size_val(src.size(), 0.0)?;

    parallel::par_iter_rows(src, &mut dst, |src_pixel, dst_pixel| {
        dst_pixel[0] = weights.luminance(
            src_pixel[0] as f64,
            src_pixel[1] as f64,
            src_pixel[2] as f64,
        );
    });

    Ok(dst)
}

/// Convert an RGB8 image to grayscale, keeping three identical channels.
///
/// Precondition: the input and output images must have the same size.
pub fn grayscale(
    src: &Image<u8, 3>,
    dst: &mut Image<u8, 3>,
    weights: GrayscaleWeights,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        dst_pixel.fill(weights.luminance_u8(src_pixel));
    });

    Ok(())
}

/// Convert a grayscale image to an RGB image by replicating the grayscale value across all three channels.
///
/// Precondition: the input and output images must have the same size.
pub fn rgb_from_gray<T>(src: &Image<T, 1>, dst: &mut Image<T, 3>) -> Result<(), ImageError>
where
    T: Copy + Send + Sync,
{
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        dst_pixel.fill(src_pixel[0]);
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::GrayscaleWeights;
    use obraz_image::{Image, ImageError, ImageSize};

    #[test]
    fn gray_from_rgb_editor_weights() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new(
            ImageSize {
                width: 3,
                height: 1,
            },
            vec![10, 20, 30, 200, 0, 0, 0, 0, 50],
        )?;

        let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0)?;
        super::gray_from_rgb(&image, &mut gray, GrayscaleWeights::EDITOR)?;

        assert_eq!(gray.as_slice(), &[18, 60, 5]);

        Ok(())
    }

    #[test]
    fn gray_from_rgb_bt601_weights() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new([1, 1].into(), vec![0, 255, 0])?;
        let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0)?;

        super::gray_from_rgb(&image, &mut gray, GrayscaleWeights::BT601)?;
        assert_eq!(gray.as_slice(), &[150]);

        Ok(())
    }

    #[test]
    fn grayscale_replicates_channels() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new([1, 2].into(), vec![255, 255, 255, 0, 100, 0])?;
        let mut dst = Image::<u8, 3>::from_size_val(image.size(), 0)?;

        super::grayscale(&image, &mut dst, GrayscaleWeights::default())?;
        assert_eq!(dst.as_slice(), &[255, 255, 255, 60, 60, 60]);

        Ok(())
    }

    #[test]
    fn rgb_from_gray() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new([2, 1].into(), vec![3, 9])?;
        let mut rgb = Image::<u8, 3>::from_size_val(image.size(), 0)?;

        super::rgb_from_gray(&image, &mut rgb)?;
        assert_eq!(rgb.as_slice(), &[3, 3, 3, 9, 9, 9]);

        Ok(())
    }

    #[test]
    fn luminance_field_is_unrounded() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new([2, 1].into(), vec![1, 0, 0, 0, 0, 255])?;
        let field = super::luminance_field(&image, GrayscaleWeights::EDITOR)?;

        approx::assert_relative_eq!(field.as_slice()[0], 0.3);
        approx::assert_relative_eq!(field.as_slice()[1], 25.5);

        Ok(())
    }

    #[test]
    fn size_mismatch() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::from_size_val([2, 2].into(), 0)?;
        let mut gray = Image::<u8, 1>::from_size_val([1, 2].into(), 0)?;

        assert_eq!(
            super::gray_from_rgb(&image, &mut gray, GrayscaleWeights::EDITOR),
            Err(ImageError::InvalidImageSize(2, 2, 1, 2))
        );

        Ok(())
    }
}
