use obraz_image::{Image, ImageError};
use rayon::prelude::*;

use crate::color::GrayscaleWeights;

/// The quantity counted by [`channel_histogram`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HistogramChannel {
    /// The red channel.
    Red,
    /// The green channel.
    Green,
    /// The blue channel.
    Blue,
    /// The rounded luminance under the given weights.
    Luminance(GrayscaleWeights),
}

/// Compute the pixel intensity histogram of an image.
///
/// NOTE: this is limited to 8-bit 1-channel images. Counts are added to `hist`.
///
/// # Arguments
///
/// * `src` - The input image to compute the histogram.
/// * `hist` - The output histogram.
/// * `num_bins` - The number of bins to use for the histogram.
///
/// # Errors
///
/// Returns an error if the number of bins is outside `1..=256` or does not match `hist`.
///
/// # Example
///
/// ```
/// use obraz_image::{Image, ImageSize};
/// use obraz_imgproc::histogram::compute_histogram;
///
/// let image = Image::<u8, 1>::new(
///   ImageSize {
///     width: 3,
///     height: 3,
///   },
///   vec![0, 2, 4, 128, 130, 132, 254, 255, 255],
/// ).unwrap();
///
/// let mut histogram = vec![0; 3];
///
/// compute_histogram(&image, &mut histogram, 3).unwrap();
/// assert_eq!(histogram, vec![3, 3, 3]);
/// ```
pub fn compute_histogram(
    src: &Image<u8, 1>,
    hist: &mut [usize],
    num_bins: usize,
) -> Result<(), ImageError> {
    if num_bins == 0 || num_bins > 256 || hist.len() != num_bins {
        return Err(ImageError::InvalidHistogramBins(num_bins));
    }

    let mut bin_lut = [0usize; 256];
    for (i, bin) in bin_lut.iter_mut().enumerate() {
        *bin = (i * num_bins) >> 8;
    }

    let counts = count_values(src.as_slice().par_iter().copied(), num_bins, &bin_lut);

    hist.iter_mut().zip(counts).for_each(|(h, c)| *h += c);

    Ok(())
}

/// Count the 256 intensity levels of one channel of an RGB image.
///
/// # Example
///
/// ```
/// use obraz_image::Image;
/// use obraz_imgproc::histogram::{channel_histogram, HistogramChannel};
///
/// let image = Image::<u8, 3>::new([2, 1].into(), vec![10, 20, 30, 10, 0, 0]).unwrap();
///
/// let red = channel_histogram(&image, HistogramChannel::Red);
/// assert_eq!(red[10], 2);
/// ```
pub fn channel_histogram(src: &Image<u8, 3>, channel: HistogramChannel) -> [usize; 256] {
    let mut identity = [0usize; 256];
    for (i, bin) in identity.iter_mut().enumerate() {
        *bin = i;
    }

    let pixels = src.as_slice().par_chunks_exact(3);
    let counts = match channel {
        HistogramChannel::Red => count_values(pixels.map(|px| px[0]), 256, &identity),
        HistogramChannel::Green => count_values(pixels.map(|px| px[1]), 256, &identity),
        HistogramChannel::Blue => count_values(pixels.map(|px| px[2]), 256, &identity),
        HistogramChannel::Luminance(weights) => {
            count_values(pixels.map(|px| weights.luminance_u8(px)), 256, &identity)
        }
    };

    let mut hist = [0usize; 256];
    hist.copy_from_slice(&counts);
    hist
}

fn count_values(
    values: impl ParallelIterator<Item = u8>,
    num_bins: usize,
    bin_lut: &[usize; 256],
) -> Vec<usize> {
    values
        .fold(
            || vec![0usize; num_bins],
            |mut local, px| {
                local[bin_lut[px as usize]] += 1;
                local
            },
        )
        .reduce(
            || vec![0usize; num_bins],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(a, b)| *a += b);
                a
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use obraz_image::ImageSize;

    #[test]
    fn test_compute_histogram() -> Result<(), ImageError> {
        let image = Image::new(
            ImageSize {
                width: 3,
                height: 3,
            },
            vec![0, 2, 4, 128, 130, 132, 254, 255, 255],
        )?;

        let mut histogram = vec![0; 3];

        compute_histogram(&image, &mut histogram, 3)?;
        assert_eq!(histogram, vec![3, 3, 3]);

        let mut histogram = vec![0; 256];
        compute_histogram(&image, &mut histogram, 256)?;
        assert_eq!(histogram[255], 2);
        assert_eq!(histogram.iter().sum::<usize>(), 9);

        Ok(())
    }

    #[test]
    fn test_invalid_bins() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::from_size_val([2, 2].into(), 0)?;

        let mut histogram = vec![0; 257];
        assert_eq!(
            compute_histogram(&image, &mut histogram, 257),
            Err(ImageError::InvalidHistogramBins(257))
        );
        assert_eq!(
            compute_histogram(&image, &mut [], 0),
            Err(ImageError::InvalidHistogramBins(0))
        );
        assert_eq!(
            compute_histogram(&image, &mut histogram[..4], 8),
            Err(ImageError::InvalidHistogramBins(8))
        );

        Ok(())
    }

    #[test]
    fn test_channel_histogram() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new(
            [3, 1].into(),
            vec![100, 0, 0, 0, 100, 0, 0, 0, 100],
        )?;

        let red = channel_histogram(&image, HistogramChannel::Red);
        assert_eq!(red[100], 1);
        assert_eq!(red[0], 2);

        let blue = channel_histogram(&image, HistogramChannel::Blue);
        assert_eq!(blue[100], 1);

        // 0.3 * 100, 0.6 * 100, 0.1 * 100
        let luma = channel_histogram(&image, HistogramChannel::Luminance(GrayscaleWeights::EDITOR));
        assert_eq!(luma[30], 1);
        assert_eq!(luma[60], 1);
        assert_eq!(luma[10], 1);
        assert_eq!(luma.iter().sum::<usize>(), 3);

        Ok(())
    }
}
