use obraz_image::{Image, ImageError};

use crate::{
    color::GrayscaleWeights,
    filter::saturate_u8,
    histogram::{channel_histogram, HistogramChannel},
    parallel,
};

/// A 256 entry lookup table mapping 8-bit samples to 8-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lut(pub [u8; 256]);

impl Lut {
    /// The table mapping every value to itself.
    pub fn identity() -> Self {
        Self::from_fn(|v| v)
    }

    /// Build a table by evaluating `f` for every input value.
    ///
    /// # Example
    ///
    /// ```
    /// use obraz_imgproc::enhance::Lut;
    ///
    /// let invert = Lut::from_fn(|v| 255 - v);
    /// assert_eq!(invert.get(0), 255);
    /// assert_eq!(invert.get(200), 55);
    /// ```
    pub fn from_fn(f: impl Fn(u8) -> u8) -> Self {
        let mut table = [0u8; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = f(i as u8);
        }
        Self(table)
    }

    /// Build the table spreading the populated range of `histogram` over `[0, 255]`.
    ///
    /// Levels below the lowest populated level map to 0 and levels above the highest to
    /// 255. A histogram with fewer than two populated levels gives the identity.
    ///
    /// # Example
    ///
    /// ```
    /// use obraz_imgproc::enhance::Lut;
    ///
    /// let mut histogram = [0usize; 256];
    /// histogram[50] = 4;
    /// histogram[150] = 2;
    ///
    /// let lut = Lut::stretch(&histogram);
    /// assert_eq!(lut.get(50), 0);
    /// assert_eq!(lut.get(150), 255);
    /// ```
    pub fn stretch(histogram: &[usize; 256]) -> Self {
        let mut populated = (0..256).filter(|&i| histogram[i] > 0);
        let Some(min) = populated.next() else {
            return Self::identity();
        };
        let max = populated.last().unwrap_or(min);
        if max == min {
            return Self::identity();
        }

        let range = (max - min) as f64;
        Self::from_fn(|v| match v as usize {
            v if v <= min => 0,
            v if v >= max => 255,
            v => saturate_u8((v - min) as f64 * 255.0 / range),
        })
    }

    /// Build the table equalizing `histogram` through its cumulative distribution.
    ///
    /// Each level maps to `255 * (cdf(v) - cdf_min) / (total - cdf_min)`, where `cdf_min`
    /// is the count of the lowest populated level. A histogram with fewer than two
    /// populated levels gives the identity.
    pub fn equalize(histogram: &[usize; 256]) -> Self {
        let total: usize = histogram.iter().sum();
        let cdf_min = histogram.iter().copied().find(|&c| c > 0).unwrap_or(0);
        if total == cdf_min {
            return Self::identity();
        }

        let mut cdf = [0usize; 256];
        let mut acc = 0;
        for (c, &count) in cdf.iter_mut().zip(histogram) {
            acc += count;
            *c = acc;
        }

        let range = (total - cdf_min) as f64;
        Self::from_fn(|v| {
            let above = cdf[v as usize] as f64 - cdf_min as f64;
            saturate_u8(above * 255.0 / range)
        })
    }

    /// Look up a single value.
    #[inline]
    pub fn get(&self, v: u8) -> u8 {
        self.0[v as usize]
    }
}

impl Default for Lut {
    fn default() -> Self {
        Self::identity()
    }
}

/// Apply a lookup table to every channel of an image.
///
/// # Arguments
///
/// * `src` - The input image.
/// * `dst` - The output image.
/// * `lut` - The table to apply.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn apply_lut<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    lut: &Lut,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows_val(src, dst, |&src_val, dst_val| {
        *dst_val = lut.get(src_val);
    });

    Ok(())
}

/// Stretch the luminance range of an RGB image to `[0, 255]`.
///
/// The table is built from the luminance histogram and applied to every channel alike,
/// so hues are kept. An image whose luminance already spans the full range, or holds a
/// single level, is copied unchanged.
///
/// # Arguments
///
/// * `src` - The input RGB image.
/// * `dst` - The output RGB image.
/// * `weights` - The weights of the luminance histogram.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn stretch_histogram(
    src: &Image<u8, 3>,
    dst: &mut Image<u8, 3>,
    weights: GrayscaleWeights,
) -> Result<(), ImageError> {
    let luminance = channel_histogram(src, HistogramChannel::Luminance(weights));
    apply_lut(src, dst, &Lut::stretch(&luminance))
}

/// Equalize the histogram of every channel of an RGB image independently.
///
/// # Arguments
///
/// * `src` - The input RGB image.
/// * `dst` - The output RGB image.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn equalize_histogram(src: &Image<u8, 3>, dst: &mut Image<u8, 3>) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let luts = [
        HistogramChannel::Red,
        HistogramChannel::Green,
        HistogramChannel::Blue,
    ]
    .map(|channel| Lut::equalize(&channel_histogram(src, channel)));

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        for ((d, &s), lut) in dst_pixel.iter_mut().zip(src_pixel).zip(&luts) {
            *d = lut.get(s);
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_lut_keeps_image() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new([2, 1].into(), vec![0, 1, 2, 253, 254, 255])?;
        let mut dst = Image::<u8, 3>::from_size_val(image.size(), 0)?;

        super::apply_lut(&image, &mut dst, &Lut::identity())?;
        assert_eq!(dst, image);

        Ok(())
    }

    #[test]
    fn threshold_lut() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new([4, 1].into(), vec![0, 127, 128, 255])?;
        let mut dst = Image::<u8, 1>::from_size_val(image.size(), 0)?;

        let lut = Lut::from_fn(|v| if v >= 128 { 255 } else { 0 });
        super::apply_lut(&image, &mut dst, &lut)?;
        assert_eq!(dst.as_slice(), &[0, 0, 255, 255]);

        Ok(())
    }

    #[test]
    fn stretch_lut() {
        let mut histogram = [0usize; 256];
        histogram[50] = 3;
        histogram[150] = 1;

        let lut = Lut::stretch(&histogram);
        assert_eq!(lut.get(10), 0);
        assert_eq!(lut.get(50), 0);
        assert_eq!(lut.get(100), 128);
        assert_eq!(lut.get(150), 255);
        assert_eq!(lut.get(200), 255);
    }

    #[test]
    fn stretch_lut_degenerate() {
        assert_eq!(Lut::stretch(&[0; 256]), Lut::identity());

        let mut histogram = [0usize; 256];
        histogram[42] = 5;
        assert_eq!(Lut::stretch(&histogram), Lut::identity());

        // already spanning the full range
        histogram[0] = 1;
        histogram[255] = 1;
        assert_eq!(Lut::stretch(&histogram), Lut::identity());
    }

    #[test]
    fn stretch_histogram_rgb() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new(
            [3, 1].into(),
            vec![50, 50, 50, 100, 100, 100, 150, 150, 150],
        )?;
        let mut dst = Image::<u8, 3>::from_size_val(image.size(), 0)?;

        stretch_histogram(&image, &mut dst, GrayscaleWeights::EDITOR)?;
        assert_eq!(dst.as_slice(), &[0, 0, 0, 128, 128, 128, 255, 255, 255]);

        let mut wrong = Image::<u8, 3>::from_size_val([1, 1].into(), 0)?;
        assert!(stretch_histogram(&image, &mut wrong, GrayscaleWeights::EDITOR).is_err());

        Ok(())
    }

    #[test]
    fn equalize_lut() {
        let mut histogram = [0usize; 256];
        histogram[10] = 1;
        histogram[20] = 1;
        histogram[30] = 2;

        let lut = Lut::equalize(&histogram);
        assert_eq!(lut.get(0), 0);
        assert_eq!(lut.get(10), 0);
        assert_eq!(lut.get(20), 85);
        assert_eq!(lut.get(25), 85);
        assert_eq!(lut.get(30), 255);
        assert_eq!(lut.get(255), 255);

        assert_eq!(Lut::equalize(&[0; 256]), Lut::identity());
    }

    #[test]
    fn equalize_histogram_per_channel() -> Result<(), ImageError> {
        // red spreads, green holds a single level, blue is already two-level
        let image = Image::<u8, 3>::new(
            [4, 1].into(),
            vec![10, 7, 0, 20, 7, 0, 30, 7, 255, 30, 7, 255],
        )?;
        let mut dst = Image::<u8, 3>::from_size_val(image.size(), 0)?;

        equalize_histogram(&image, &mut dst)?;
        assert_eq!(
            dst.as_slice(),
            &[0, 7, 0, 85, 7, 0, 255, 7, 255, 255, 7, 255]
        );

        let mut wrong = Image::<u8, 3>::from_size_val([2, 2].into(), 0)?;
        assert_eq!(
            equalize_histogram(&image, &mut wrong),
            Err(ImageError::InvalidImageSize(4, 1, 2, 2))
        );

        Ok(())
    }
}
