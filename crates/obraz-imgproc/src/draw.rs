use obraz_image::Image;

/// Draws a line on an image inplace using Bresenham's line algorithm.
///
/// Points of the line that fall outside the image are skipped, so the endpoints may lie
/// anywhere.
///
/// # Arguments
///
/// * `img` - The image to draw on.
/// * `p0` - The start point of the line as a tuple of (x, y).
/// * `p1` - The end point of the line as a tuple of (x, y).
/// * `color` - The color of the line as an array of `C` elements.
///
/// # Example
///
/// ```
/// use obraz_image::Image;
/// use obraz_imgproc::draw::draw_line;
///
/// let mut img = Image::<u8, 1>::from_size_val([4, 4].into(), 0).unwrap();
/// draw_line(&mut img, (0, 0), (3, 3), [255]);
///
/// assert_eq!(img.pixel(2, 2), [255]);
/// assert_eq!(img.pixel(2, 1), [0]);
/// ```
pub fn draw_line<const C: usize>(
    img: &mut Image<u8, C>,
    p0: (i64, i64),
    p1: (i64, i64),
    color: [u8; C],
) {
    let (mut x0, mut y0) = p0;
    let (x1, y1) = p1;

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };

    let mut err = dx - dy;

    loop {
        img.set_pixel(x0, y0, color);

        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }
        if e2 < dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::draw_line;
    use obraz_image::{Image, ImageError};

    #[test]
    fn test_draw_line_horizontal() -> Result<(), ImageError> {
        let mut img = Image::<u8, 1>::from_size_val([5, 3].into(), 0)?;
        draw_line(&mut img, (0, 1), (4, 1), [255]);

        #[rustfmt::skip]
        assert_eq!(
            img.as_slice(),
            &[
                0, 0, 0, 0, 0,
                255, 255, 255, 255, 255,
                0, 0, 0, 0, 0,
            ]
        );

        Ok(())
    }

    #[test]
    fn test_draw_line_is_symmetric() -> Result<(), ImageError> {
        let mut forward = Image::<u8, 1>::from_size_val([8, 8].into(), 0)?;
        let mut backward = Image::<u8, 1>::from_size_val([8, 8].into(), 0)?;

        draw_line(&mut forward, (1, 1), (7, 4), [1]);
        draw_line(&mut backward, (7, 4), (1, 1), [1]);

        // one pixel per column along the major axis
        for x in 1..=7 {
            let column: u8 = (0..8).map(|y| forward.pixel(x, y)[0]).sum();
            assert_eq!(column, 1);
        }
        assert_eq!(forward.pixel(1, 1), [1]);
        assert_eq!(forward.pixel(7, 4), [1]);
        assert_eq!(
            forward.as_slice().iter().filter(|&&v| v == 1).count(),
            backward.as_slice().iter().filter(|&&v| v == 1).count()
        );

        Ok(())
    }

    #[test]
    fn test_draw_line_clipped() -> Result<(), ImageError> {
        let mut img = Image::<u8, 3>::from_size_val([4, 4].into(), 0)?;
        draw_line(&mut img, (-3, 2), (10, 2), [255, 0, 0]);

        for x in 0..4 {
            assert_eq!(img.pixel(x, 2), [255, 0, 0]);
        }
        assert_eq!(img.pixel(0, 1), [0, 0, 0]);

        Ok(())
    }
}
