use std::f64::consts::PI;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

use obraz_image::{Image, ImageError};

use crate::{
    color::{gray_from_rgb, GrayscaleWeights},
    draw::draw_line,
    filter::{filter2d, kernels::Kernel, Response},
};

/// Edge filter applied before voting.
#[rustfmt::skip]
const EDGE_KERNEL: [f64; 9] = [
     0.0, -1.0,  0.0,
    -1.0,  4.0, -1.0,
     0.0, -1.0,  0.0,
];

/// Below this `|sin θ|` a line is drawn from its x intercept.
const VERTICAL_EPS: f64 = 0.001;

/// Parameters of the Hough line transform.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HoughConfig {
    /// Angular bins per degree. Zero is treated as one.
    pub theta_density: usize,
    /// Vote with the grayscale image directly instead of its laplacian response.
    pub skip_edge_detection: bool,
    /// Weights of the grayscale conversion.
    pub weights: GrayscaleWeights,
    #[cfg_attr(feature = "serde", serde(skip))]
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            theta_density: 1,
            skip_edge_detection: false,
            weights: GrayscaleWeights::EDITOR,
            cancel: None,
        }
    }
}

impl HoughConfig {
    /// Set the number of angular bins per degree.
    pub fn with_theta_density(mut self, theta_density: usize) -> Self {
        self.theta_density = theta_density;
        self
    }

    /// Vote with every non black pixel of the input instead of its edges.
    pub fn with_skip_edge_detection(mut self, skip: bool) -> Self {
        self.skip_edge_detection = skip;
        self
    }

    /// Set the grayscale weights.
    pub fn with_weights(mut self, weights: GrayscaleWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Abort the transform when `token` becomes `true`.
    ///
    /// The token is polled once per image row.
    pub fn with_cancel_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancel = Some(token);
        self
    }

    fn theta_size(&self) -> usize {
        180 * self.theta_density.max(1)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_deref()
            .is_some_and(|token| token.load(Ordering::Relaxed))
    }
}

/// A line in normal form `x·cos θ + y·sin θ = ρ`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HoughLine {
    /// Angle of the line normal in radians, in `[0, π)`.
    pub theta: f64,
    /// Signed distance of the line from the origin in pixels.
    pub rho: f64,
    /// Number of pixels that voted for the line.
    pub votes: u32,
}

/// The vote counts of a Hough transform over `(θ, ρ)`.
///
/// Cells are stored row-major with one row per ρ bin, so the accumulator renders as an image
/// `theta_size` wide and `2 * rho_max + 1` high.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoughAccumulator {
    theta_size: usize,
    rho_max: usize,
    votes: Vec<u32>,
}

impl HoughAccumulator {
    fn new(theta_size: usize, rho_max: usize) -> Self {
        Self {
            theta_size,
            rho_max,
            votes: vec![0; theta_size * (2 * rho_max + 1)],
        }
    }

    /// The number of angular bins.
    pub fn theta_size(&self) -> usize {
        self.theta_size
    }

    /// The largest representable `|ρ|`.
    pub fn rho_max(&self) -> usize {
        self.rho_max
    }

    /// The number of ρ bins, `2 * rho_max + 1`.
    pub fn rho_size(&self) -> usize {
        2 * self.rho_max + 1
    }

    /// The raw vote counts.
    pub fn votes(&self) -> &[u32] {
        &self.votes
    }

    /// The angle in radians of bin `k`.
    pub fn theta(&self, k: usize) -> f64 {
        k as f64 * PI / self.theta_size as f64
    }

    /// The votes of angle bin `k` at distance `rho`, zero outside the accumulator.
    pub fn get(&self, k: usize, rho: i64) -> u32 {
        let r = rho + self.rho_max as i64;
        if k >= self.theta_size || r < 0 || r as usize >= self.rho_size() {
            return 0;
        }
        self.votes[r as usize * self.theta_size + k]
    }

    fn line(&self, k: usize, r: usize) -> HoughLine {
        HoughLine {
            theta: self.theta(k),
            rho: r as f64 - self.rho_max as f64,
            votes: self.votes[r * self.theta_size + k],
        }
    }

    /// Every cell with more than `threshold` votes, ordered by angle then distance.
    pub fn peaks(&self, threshold: u32) -> Vec<HoughLine> {
        let mut peaks = Vec::new();
        for k in 0..self.theta_size {
            for r in 0..self.rho_size() {
                if self.votes[r * self.theta_size + k] > threshold {
                    peaks.push(self.line(k, r));
                }
            }
        }
        peaks
    }

    /// The cell with the most votes, `None` when nothing voted.
    ///
    /// Ties resolve to the smallest angle, then the smallest distance.
    pub fn max_cell(&self) -> Option<HoughLine> {
        let mut best: Option<HoughLine> = None;
        for k in 0..self.theta_size {
            for r in 0..self.rho_size() {
                let votes = self.votes[r * self.theta_size + k];
                if votes > best.map_or(0, |line| line.votes) {
                    best = Some(self.line(k, r));
                }
            }
        }
        best
    }

    /// Render the votes scaled to `[0, 255]` by the global maximum.
    ///
    /// An accumulator without votes renders black.
    pub fn to_image(&self) -> Result<Image<u8, 1>, ImageError> {
        let max = self.votes.iter().copied().max().unwrap_or(0) as u64;

        let data = self
            .votes
            .iter()
            .map(|&v| if max == 0 { 0 } else { (v as u64 * 255 / max) as u8 })
            .collect();

        Image::new([self.theta_size, self.rho_size()].into(), data)
    }
}

/// Accumulate line votes for every bright pixel of an image.
///
/// The image is converted to grayscale and, unless `skip_edge_detection` is set, filtered
/// with a 3x3 laplacian. Every pixel with a non zero result votes once per angle bin.
///
/// # Errors
///
/// Returns [`ImageError::Cancelled`] if the cancel token was raised.
///
/// # Example
///
/// ```
/// use obraz_image::Image;
/// use obraz_imgproc::hough::{hough_transform, HoughConfig};
///
/// // a horizontal line at y = 10
/// let image = Image::<u8, 3>::from_fn([32, 24].into(), |_, y| {
///     if y == 10 { [255, 255, 255] } else { [0, 0, 0] }
/// });
///
/// let accumulator = hough_transform(&image, &HoughConfig::default()).unwrap();
/// let line = accumulator.max_cell().unwrap();
///
/// assert_eq!(line.votes, 32);
/// assert_eq!(line.rho, 10.0);
/// assert!((line.theta.to_degrees() - 90.0).abs() < 1e-9);
/// ```
pub fn hough_transform(
    src: &Image<u8, 3>,
    config: &HoughConfig,
) -> Result<HoughAccumulator, ImageError> {
    let started = Instant::now();

    let mut gray = Image::<u8, 1>::from_size_val(src.size(), 0)?;
    gray_from_rgb(src, &mut gray, config.weights)?;

    let edges = if config.skip_edge_detection {
        gray
    } else {
        let kernel = Kernel::new(3, EDGE_KERNEL.to_vec())?;
        let mut edges = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        filter2d(&gray, &mut edges, &kernel, Response::Signed)?;
        edges
    };

    let (cols, rows) = (src.cols(), src.rows());
    let diagonal = ((cols * cols + rows * rows) as f64).sqrt();
    let mut accumulator = HoughAccumulator::new(config.theta_size(), diagonal.ceil() as usize);

    let trig: Vec<(f64, f64)> = (0..accumulator.theta_size)
        .map(|k| accumulator.theta(k).sin_cos())
        .collect();
    let theta_size = accumulator.theta_size;
    let rho_max = accumulator.rho_max as i64;

    for (y, row) in edges.as_slice().chunks_exact(cols.max(1)).enumerate() {
        if config.is_cancelled() {
            log::debug!("hough: cancelled at row {y}");
            return Err(ImageError::Cancelled);
        }

        for (x, &value) in row.iter().enumerate() {
            if value == 0 {
                continue;
            }
            for (k, &(sin, cos)) in trig.iter().enumerate() {
                let rho = x as f64 * cos + y as f64 * sin;
                let r = (rho.round() as i64 + rho_max) as usize;
                accumulator.votes[r * theta_size + k] += 1;
            }
        }
    }

    log::debug!(
        "hough: {}x{} accumulator in {:?}",
        accumulator.theta_size(),
        accumulator.rho_size(),
        started.elapsed()
    );

    Ok(accumulator)
}

/// Draw lines given in normal form across the whole image.
///
/// # Arguments
///
/// * `image` - The image to draw on.
/// * `lines` - The lines, typically from [`HoughAccumulator::peaks`].
/// * `color` - The color of the lines.
pub fn draw_lines<const C: usize>(image: &mut Image<u8, C>, lines: &[HoughLine], color: [u8; C]) {
    if image.cols() == 0 || image.rows() == 0 {
        return;
    }

    let last_x = image.cols() as f64 - 1.0;
    let last_y = image.rows() as f64 - 1.0;

    for line in lines {
        let (sin, cos) = line.theta.sin_cos();

        let (p0, p1) = if sin.abs() < VERTICAL_EPS {
            let x = line.rho / cos;
            ((x, 0.0), (x, last_y))
        } else if sin.abs() >= cos.abs() {
            let y = |x: f64| (line.rho - x * cos) / sin;
            ((0.0, y(0.0)), (last_x, y(last_x)))
        } else {
            let x = |y: f64| (line.rho - y * sin) / cos;
            ((x(0.0), 0.0), (x(last_y), last_y))
        };

        draw_line(
            image,
            (p0.0.round() as i64, p0.1.round() as i64),
            (p1.0.round() as i64, p1.1.round() as i64),
            color,
        );
    }
}

/// Detect straight lines and draw them over the image.
///
/// # Arguments
///
/// * `image` - The image to analyse and draw on.
/// * `config` - The transform parameters.
/// * `threshold` - The number of votes a line must exceed.
/// * `color` - The color of the drawn lines.
///
/// # Returns
///
/// The detected lines. The image is left untouched when the transform fails.
pub fn detect_lines(
    image: &mut Image<u8, 3>,
    config: &HoughConfig,
    threshold: u32,
    color: [u8; 3],
) -> Result<Vec<HoughLine>, ImageError> {
    let accumulator = hough_transform(image, config)?;
    let lines = accumulator.peaks(threshold);

    log::debug!("hough: {} lines above {} votes", lines.len(), threshold);

    draw_lines(image, &lines, color);

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn horizontal_line(cols: usize, rows: usize, at: usize) -> Image<u8, 3> {
        Image::from_fn([cols, rows].into(), |_, y| {
            if y == at {
                [255, 255, 255]
            } else {
                [0, 0, 0]
            }
        })
    }

    #[test]
    fn test_accumulator_shape() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::from_size_val([3, 4].into(), 0)?;

        let accumulator = hough_transform(&image, &HoughConfig::default().with_theta_density(2))?;
        assert_eq!(accumulator.theta_size(), 360);
        assert_eq!(accumulator.rho_max(), 5);
        assert_eq!(accumulator.rho_size(), 11);
        assert_eq!(accumulator.votes().len(), 360 * 11);

        let accumulator = hough_transform(&image, &HoughConfig::default().with_theta_density(0))?;
        assert_eq!(accumulator.theta_size(), 180);

        Ok(())
    }

    #[test]
    fn test_empty_image_renders_black() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::from_size_val([8, 6].into(), 0)?;
        let accumulator = hough_transform(&image, &HoughConfig::default())?;

        assert!(accumulator.max_cell().is_none());
        assert!(accumulator.peaks(0).is_empty());

        let rendered = accumulator.to_image()?;
        assert_eq!(rendered.cols(), 180);
        assert_eq!(rendered.rows(), 21);
        assert!(rendered.as_slice().iter().all(|&v| v == 0));

        Ok(())
    }

    #[test]
    fn test_horizontal_line() -> Result<(), ImageError> {
        let image = horizontal_line(32, 32, 10);

        for skip in [false, true] {
            let config = HoughConfig::default().with_skip_edge_detection(skip);
            let accumulator = hough_transform(&image, &config)?;

            let line = accumulator.max_cell().expect("a line was detected");
            assert_eq!(line.votes, 32);
            assert_relative_eq!(line.rho, 10.0);
            assert_relative_eq!(line.theta, PI / 2.0);
            assert_eq!(accumulator.get(90, 10), 32);

            let rendered = accumulator.to_image()?;
            assert_eq!(rendered.pixel(90, 10 + accumulator.rho_max() as i64), [255]);
        }

        Ok(())
    }

    #[test]
    fn test_diagonal_line() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::from_fn([32, 32].into(), |x, y| {
            if x == y {
                [255, 255, 255]
            } else {
                [0, 0, 0]
            }
        });

        let config = HoughConfig::default().with_skip_edge_detection(true);
        let line = hough_transform(&image, &config)?
            .max_cell()
            .expect("a line was detected");

        assert_eq!(line.votes, 32);
        assert!((line.theta.to_degrees() - 135.0).abs() <= 1.0);
        assert!(line.rho.abs() <= 1.0);

        Ok(())
    }

    #[test]
    fn test_peaks_threshold() -> Result<(), ImageError> {
        let image = horizontal_line(32, 32, 10);
        let config = HoughConfig::default().with_skip_edge_detection(true);
        let accumulator = hough_transform(&image, &config)?;

        let peaks = accumulator.peaks(31);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].votes, 32);

        assert!(accumulator.peaks(32).is_empty());

        // sorted by angle
        let peaks = accumulator.peaks(20);
        assert!(peaks.len() > 1);
        assert!(peaks.windows(2).all(|w| w[0].theta <= w[1].theta));

        Ok(())
    }

    #[test]
    fn test_draw_lines() -> Result<(), ImageError> {
        let mut image = Image::<u8, 1>::from_size_val([6, 5].into(), 0)?;

        let vertical = HoughLine {
            theta: 0.0,
            rho: 2.0,
            votes: 1,
        };
        let horizontal = HoughLine {
            theta: PI / 2.0,
            rho: 3.0,
            votes: 1,
        };
        draw_lines(&mut image, &[vertical, horizontal], [255]);

        for y in 0..5 {
            assert_eq!(image.pixel(2, y), [255]);
        }
        for x in 0..6 {
            assert_eq!(image.pixel(x, 3), [255]);
        }
        assert_eq!(image.as_slice().iter().filter(|&&v| v == 255).count(), 5 + 6 - 1);

        Ok(())
    }

    #[test]
    fn test_detect_lines() -> Result<(), ImageError> {
        let mut image = horizontal_line(40, 10, 4);
        image.set_pixel(0, 4, [0, 0, 0]);

        let config = HoughConfig::default().with_skip_edge_detection(true);
        let lines = detect_lines(&mut image, &config, 30, [255, 0, 0])?;

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].votes, 39);
        for x in 0..40 {
            assert_eq!(image.pixel(x, 4), [255, 0, 0]);
        }
        assert_eq!(image.pixel(0, 3), [0, 0, 0]);

        Ok(())
    }

    #[test]
    fn test_cancelled() -> Result<(), ImageError> {
        let mut image = horizontal_line(8, 8, 2);
        let original = image.clone();

        let token = Arc::new(AtomicBool::new(true));
        let config = HoughConfig::default().with_cancel_token(token);

        assert_eq!(
            detect_lines(&mut image, &config, 0, [255, 0, 0]),
            Err(ImageError::Cancelled)
        );
        assert_eq!(image, original);

        Ok(())
    }
}
