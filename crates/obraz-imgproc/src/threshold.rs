use num_traits::Zero;
use std::cmp::PartialOrd;

use obraz_image::{Image, ImageError};

use crate::{color::GrayscaleWeights, histogram::compute_histogram, parallel};

/// Threshold used when a histogram cannot be split into two classes.
const OTSU_FALLBACK: u8 = 128;

/// Apply a binary threshold to an image.
///
/// # Arguments
///
/// * `src` - The input image of an arbitrary number of channels and type.
/// * `dst` - The output image of an arbitrary number of channels and type.
/// * `threshold` - The threshold value. Must be the same type as the image.
/// * `max_value` - The maximum value to use when the input value is greater than the threshold.
///
/// # Examples
///
/// ```
/// use obraz_image::{Image, ImageSize};
/// use obraz_imgproc::threshold::threshold_binary;
///
/// let data = vec![100u8, 200, 50, 150, 200, 250];
/// let image = Image::<_, 1>::new(ImageSize { width: 2, height: 3 }, data).unwrap();
///
/// let mut thresholded = Image::<_, 1>::from_size_val(image.size(), 0).unwrap();
///
/// threshold_binary(&image, &mut thresholded, 100, 255).unwrap();
/// assert_eq!(thresholded.as_slice(), &[0, 255, 0, 255, 255, 255]);
/// ```
pub fn threshold_binary<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    threshold: T,
    max_value: T,
) -> Result<(), ImageError>
where
    T: Copy + Send + Sync + PartialOrd + Zero,
{
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    // run the thresholding operation in parallel
    parallel::par_iter_rows_val(src, dst, |src_pixel, dst_pixel| {
        *dst_pixel = if *src_pixel > threshold {
            max_value
        } else {
            T::zero()
        };
    });

    Ok(())
}

/// Find the threshold that maximizes the between-class variance of a histogram.
///
/// Pixels at or below the returned value form the background class. When several
/// thresholds reach the same variance the middle of that run is returned. A histogram with
/// fewer than two populated levels yields 128.
///
/// # Example
///
/// ```
/// use obraz_imgproc::threshold::otsu_threshold_value;
///
/// let mut histogram = [0usize; 256];
/// histogram[10] = 50;
/// histogram[240] = 50;
///
/// let threshold = otsu_threshold_value(&histogram);
/// assert!(threshold > 10 && threshold < 240);
/// ```
pub fn otsu_threshold_value(histogram: &[usize; 256]) -> u8 {
    let total = histogram.iter().sum::<usize>() as f64;
    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut best_variance = 0.0;
    let mut best_range: Option<(usize, usize)> = None;

    let mut weight_back = 0.0;
    let mut sum_back = 0.0;

    for (threshold, &count) in histogram.iter().enumerate() {
        weight_back += count as f64;
        sum_back += threshold as f64 * count as f64;

        // skip empty classes
        if weight_back == 0.0 || weight_back == total {
            continue;
        }

        let weight_fore = total - weight_back;
        let mean_back = sum_back / weight_back;
        let mean_fore = (sum_total - sum_back) / weight_fore;

        let variance = weight_back * weight_fore * (mean_back - mean_fore).powi(2);

        match best_range {
            Some((first, _)) if variance == best_variance => {
                best_range = Some((first, threshold));
            }
            _ if variance > best_variance => {
                best_variance = variance;
                best_range = Some((threshold, threshold));
            }
            _ => {}
        }
    }

    match best_range {
        Some((first, last)) => ((first + last) / 2) as u8,
        None => OTSU_FALLBACK,
    }
}

/// Binarize a grayscale image with the threshold found by Otsu's method.
///
/// # Arguments
///
/// * `src` - The input grayscale image.
/// * `dst` - The output image, `max_value` above the threshold and 0 elsewhere.
/// * `max_value` - The foreground value.
///
/// # Returns
///
/// The threshold that was applied.
///
/// # Example
///
/// ```
/// use obraz_image::{Image, ImageSize};
/// use obraz_imgproc::threshold::otsu_threshold;
///
/// let data = vec![100u8, 200, 50, 150, 200, 250];
/// let image = Image::<_, 1>::new(
///    ImageSize {
///       width: 2,
///       height: 3,
///    },
///    data,
/// ).unwrap();
///
/// let mut thresholded = Image::<_, 1>::from_size_val(image.size(), 0).unwrap();
///
/// otsu_threshold(&image, &mut thresholded, 255).unwrap();
/// assert_eq!(thresholded.as_slice(), [0, 255, 0, 255, 255, 255]);
/// ```
pub fn otsu_threshold(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    max_value: u8,
) -> Result<u8, ImageError> {
    let mut histogram = [0usize; 256];
    compute_histogram(src, &mut histogram, 256)?;

    let threshold = otsu_threshold_value(&histogram);
    log::debug!("otsu: threshold {threshold}");

    threshold_binary(src, dst, threshold, max_value)?;

    Ok(threshold)
}

/// Binarize an RGB image by its luminance.
///
/// Pixels whose rounded luminance exceeds `threshold` become white, all others black.
///
/// PRECONDITION: `src` and `dst` must have the same size.
pub fn binarize(
    src: &Image<u8, 3>,
    dst: &mut Image<u8, 3>,
    threshold: u8,
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
        let value = if weights.luminance_u8(src_pixel) > threshold {
            255
        } else {
            0
        };
        dst_pixel.fill(value);
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use obraz_image::ImageSize;

    #[test]
    fn test_threshold_binary() -> Result<(), ImageError> {
        let data = vec![100u8, 200, 50, 150, 200, 250];
        let data_expected = [0u8, 255, 0, 255, 255, 255];
        let image = Image::<_, 1>::new(
            ImageSize {
                width: 2,
                height: 3,
            },
            data,
        )?;

        let mut thresholded = Image::<_, 1>::from_size_val(image.size(), 0)?;

        threshold_binary(&image, &mut thresholded, 100, 255)?;

        assert_eq!(thresholded.num_channels(), 1);
        assert_eq!(thresholded.size().width, 2);
        assert_eq!(thresholded.size().height, 3);

        assert_eq!(thresholded.as_slice(), data_expected);

        Ok(())
    }

    #[test]
    fn test_threshold_binary_f64() -> Result<(), ImageError> {
        let image = Image::<f64, 1>::new([3, 1].into(), vec![0.2, 0.5, 0.9])?;
        let mut thresholded = Image::<f64, 1>::from_size_val(image.size(), 0.0)?;

        threshold_binary(&image, &mut thresholded, 0.5, 1.0)?;
        assert_eq!(thresholded.as_slice(), &[0.0, 0.0, 1.0]);

        Ok(())
    }

    #[test]
    fn test_otsu_threshold_value() {
        let mut histogram = [0usize; 256];
        histogram[10] = 50;
        histogram[240] = 50;
        assert_eq!(otsu_threshold_value(&histogram), 124);

        let mut histogram = [0usize; 256];
        for v in [20, 20, 30, 200, 210, 220] {
            histogram[v] += 1;
        }
        let threshold = otsu_threshold_value(&histogram);
        assert!(threshold >= 30 && threshold < 200);
    }

    #[test]
    fn test_otsu_degenerate() {
        assert_eq!(otsu_threshold_value(&[0; 256]), 128);

        let mut histogram = [0usize; 256];
        histogram[7] = 9;
        assert_eq!(otsu_threshold_value(&histogram), 128);
    }

    #[test]
    fn test_otsu_threshold() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::from_fn([4, 2].into(), |x, _| [if x < 2 { 10 } else { 240 }]);
        let mut thresholded = Image::<u8, 1>::from_size_val(image.size(), 0)?;

        let threshold = otsu_threshold(&image, &mut thresholded, 200)?;
        assert_eq!(threshold, 124);
        assert_eq!(thresholded.as_slice(), &[0, 0, 200, 200, 0, 0, 200, 200]);

        Ok(())
    }

    #[test]
    fn test_binarize() -> Result<(), ImageError> {
        // luminance 30, 60 and 10
        let image = Image::<u8, 3>::new([3, 1].into(), vec![100, 0, 0, 0, 100, 0, 0, 0, 100])?;
        let mut binary = Image::<u8, 3>::from_size_val(image.size(), 7)?;

        binarize(&image, &mut binary, 30, GrayscaleWeights::EDITOR)?;
        assert_eq!(binary.as_slice(), &[0, 0, 0, 255, 255, 255, 0, 0, 0]);

        binarize(&image, &mut binary, 0, GrayscaleWeights::EDITOR)?;
        assert!(binary.as_slice().iter().all(|&v| v == 255));

        let mut wrong = Image::<u8, 3>::from_size_val([1, 1].into(), 0)?;
        assert!(binarize(&image, &mut wrong, 0, GrayscaleWeights::EDITOR).is_err());

        Ok(())
    }
}
