use rayon::prelude::*;

use obraz_image::Image;

/// Apply a function to each pixel in the image in parallel.
///
/// The rows of `src` and `dst` are zipped and processed on the rayon global pool; `f`
/// receives the `C1` samples of a source pixel and the `C2` samples of the matching
/// destination pixel.
///
/// PRECONDITION: `src` and `dst` must have the same size.
pub fn par_iter_rows<T1, const C1: usize, T2, const C2: usize>(
    src: &Image<T1, C1>,
    dst: &mut Image<T2, C2>,
    f: impl Fn(&[T1], &mut [T2]) + Send + Sync,
) where
    T1: Send + Sync,
    T2: Send + Sync,
{
    let cols = src.cols();
    if cols == 0 {
        return;
    }

    src.as_slice()
        .par_chunks_exact(C1 * cols)
        .zip(dst.as_slice_mut().par_chunks_exact_mut(C2 * cols))
        .for_each(|(src_chunk, dst_chunk)| {
            src_chunk
                .chunks_exact(C1)
                .zip(dst_chunk.chunks_exact_mut(C2))
                .for_each(|(src_pixel, dst_pixel)| {
                    f(src_pixel, dst_pixel);
                });
        });
}

/// Apply a function to each sample in the image in parallel.
///
/// PRECONDITION: `src` and `dst` must have the same size.
pub fn par_iter_rows_val<T1, T2, const C: usize>(
    src: &Image<T1, C>,
    dst: &mut Image<T2, C>,
    f: impl Fn(&T1, &mut T2) + Send + Sync,
) where
    T1: Send + Sync,
    T2: Send + Sync,
{
    let cols = src.cols();
    if cols == 0 {
        return;
    }

    src.as_slice()
        .par_chunks_exact(C * cols)
        .zip(dst.as_slice_mut().par_chunks_exact_mut(C * cols))
        .for_each(|(src_chunk, dst_chunk)| {
            src_chunk
                .iter()
                .zip(dst_chunk.iter_mut())
                .for_each(|(src_pixel, dst_pixel)| {
                    f(src_pixel, dst_pixel);
                });
        });
}

/// Fill every pixel of `dst` in parallel from its coordinate.
///
/// `f(x, y, dst_pixel)` is called once per pixel; rows are distributed over the rayon
/// global pool. Used by the neighbourhood operations which read from a captured source.
pub fn par_iter_rows_indexed<T, const C: usize>(
    dst: &mut Image<T, C>,
    f: impl Fn(usize, usize, &mut [T]) + Send + Sync,
) where
    T: Send + Sync,
{
    let cols = dst.cols();
    if cols == 0 {
        return;
    }

    dst.as_slice_mut()
        .par_chunks_exact_mut(C * cols)
        .enumerate()
        .for_each(|(y, dst_row)| {
            dst_row
                .chunks_exact_mut(C)
                .enumerate()
                .for_each(|(x, dst_pixel)| f(x, y, dst_pixel));
        });
}

#[cfg(test)]
mod tests {
    use obraz_image::{Image, ImageError};

    #[test]
    fn test_par_iter_rows() -> Result<(), ImageError> {
        let src = Image::<u8, 3>::new([2, 2].into(), (0..12).collect())?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;

        super::par_iter_rows(&src, &mut dst, |s, d| d[0] = s[2]);
        assert_eq!(dst.as_slice(), &[2, 5, 8, 11]);

        Ok(())
    }

    #[test]
    fn test_par_iter_rows_val() -> Result<(), ImageError> {
        let src = Image::<u8, 1>::new([2, 2].into(), vec![1, 2, 3, 4])?;
        let mut dst = Image::<u16, 1>::from_size_val(src.size(), 0)?;

        super::par_iter_rows_val(&src, &mut dst, |&s, d| *d = s as u16 * 100);
        assert_eq!(dst.as_slice(), &[100, 200, 300, 400]);

        Ok(())
    }

    #[test]
    fn test_par_iter_rows_indexed() -> Result<(), ImageError> {
        let mut dst = Image::<usize, 2>::from_size_val([3, 2].into(), 0)?;

        super::par_iter_rows_indexed(&mut dst, |x, y, px| {
            px[0] = x;
            px[1] = y;
        });
        assert_eq!(dst.pixel(2, 1), [2, 1]);
        assert_eq!(dst.pixel(0, 1), [0, 1]);

        Ok(())
    }

    #[test]
    fn test_empty_image_is_noop() -> Result<(), ImageError> {
        let src = Image::<u8, 1>::new([0, 0].into(), vec![])?;
        let mut dst = Image::<u8, 1>::new([0, 0].into(), vec![])?;

        super::par_iter_rows_val(&src, &mut dst, |&s, d| *d = s);
        assert!(dst.as_slice().is_empty());

        Ok(())
    }
}
