use std::time::Instant;

use obraz_image::{Image, ImageError};

use crate::{
    color::{gray_from_rgb, GrayscaleWeights},
    edges::{magnitude_direction, spatial_gradient},
    filter::{gaussian_blur, kernels::GradientOperator},
    parallel,
};

/// Maximum orientation difference, in degrees, between two linked edge pixels.
const MAX_LINK_ANGLE: f64 = 22.5;

/// Parameters of the Canny edge detector.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CannyConfig {
    /// Magnitude a non-maximum-suppressed pixel must exceed to seed an edge.
    pub upper_threshold: f64,
    /// Magnitude a pixel must reach to extend an edge.
    pub lower_threshold: f64,
    /// Standard deviation of the smoothing gaussian. The detector is tuned for the
    /// default of 1.6.
    pub blur_sigma: f64,
    /// Size of the smoothing kernel. Defaults to 3, which together with the default sigma
    /// gives the fixed smoothing stage of the detector.
    pub blur_kernel_size: usize,
    /// Weights of the grayscale conversion.
    pub weights: GrayscaleWeights,
}

impl Default for CannyConfig {
    fn default() -> Self {
        Self {
            upper_threshold: 50.0,
            lower_threshold: 20.0,
            blur_sigma: 1.6,
            blur_kernel_size: 3,
            weights: GrayscaleWeights::EDITOR,
        }
    }
}

impl CannyConfig {
    /// Set the hysteresis thresholds.
    pub fn with_thresholds(mut self, upper: f64, lower: f64) -> Self {
        self.upper_threshold = upper;
        self.lower_threshold = lower;
        self
    }

    /// Set the smoothing gaussian.
    pub fn with_blur(mut self, sigma: f64, kernel_size: usize) -> Self {
        self.blur_sigma = sigma;
        self.blur_kernel_size = kernel_size;
        self
    }

    /// Set the grayscale weights.
    pub fn with_weights(mut self, weights: GrayscaleWeights) -> Self {
        self.weights = weights;
        self
    }

    /// The `(upper, lower)` thresholds actually used.
    ///
    /// `upper >= 1` and `1 <= lower <= max(1, 0.8 * upper)`.
    pub fn sanitized_thresholds(&self) -> (f64, f64) {
        let upper = self.upper_threshold.max(1.0);
        let lower = self.lower_threshold.min(upper * 0.8).max(1.0);
        (upper, lower)
    }
}

/// The stages of the Canny pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CannyStage {
    /// Convert the input to luminance.
    Grayscale,
    /// Smooth the luminance.
    Blur,
    /// Compute the Sobel derivatives.
    Gradient,
    /// Compute gradient magnitude and orientation.
    MagnitudeDirection,
    /// Keep the strong local maxima across the edge.
    NonMaxSuppression,
    /// Follow edges from the strong seeds.
    Hysteresis,
    /// The edge map is available.
    Done,
}

enum State {
    Grayscale,
    Blur {
        gray: Image<u8, 1>,
    },
    Gradient {
        blurred: Image<u8, 1>,
    },
    MagnitudeDirection {
        gx: Image<f64, 1>,
        gy: Image<f64, 1>,
    },
    NonMaxSuppression {
        magnitude: Image<f64, 1>,
        direction: Image<f64, 1>,
    },
    Hysteresis {
        magnitude: Image<f64, 1>,
        direction: Image<f64, 1>,
        strong: Vec<bool>,
    },
    Done {
        edges: Image<u8, 1>,
    },
}

/// The Canny edge detector as an explicit sequence of stages.
///
/// Every call to [`CannyPipeline::step`] runs exactly one stage and moves to the next; the
/// intermediate buffers of a stage are dropped as soon as the following stage has consumed
/// them. Stepping a finished pipeline does nothing.
///
/// # Example
///
/// ```
/// use obraz_image::Image;
/// use obraz_imgproc::canny::{CannyConfig, CannyPipeline, CannyStage};
///
/// let image = Image::<u8, 3>::from_size_val([8, 8].into(), 0).unwrap();
/// let mut pipeline = CannyPipeline::new(&image, CannyConfig::default());
///
/// assert_eq!(pipeline.stage(), CannyStage::Grayscale);
/// assert_eq!(pipeline.step().unwrap(), CannyStage::Blur);
///
/// let edges = pipeline.finish().unwrap();
/// assert!(edges.as_slice().iter().all(|&v| v == 0));
/// ```
pub struct CannyPipeline<'a> {
    src: &'a Image<u8, 3>,
    config: CannyConfig,
    state: State,
}

impl<'a> CannyPipeline<'a> {
    /// Create a pipeline positioned before the grayscale stage.
    pub fn new(src: &'a Image<u8, 3>, config: CannyConfig) -> Self {
        Self {
            src,
            config,
            state: State::Grayscale,
        }
    }

    /// The stage that the next call to [`CannyPipeline::step`] will run.
    pub fn stage(&self) -> CannyStage {
        match self.state {
            State::Grayscale => CannyStage::Grayscale,
            State::Blur { .. } => CannyStage::Blur,
            State::Gradient { .. } => CannyStage::Gradient,
            State::MagnitudeDirection { .. } => CannyStage::MagnitudeDirection,
            State::NonMaxSuppression { .. } => CannyStage::NonMaxSuppression,
            State::Hysteresis { .. } => CannyStage::Hysteresis,
            State::Done { .. } => CannyStage::Done,
        }
    }

    /// Run the current stage and return the stage that follows.
    ///
    /// On error the pipeline stays at the failed stage.
    pub fn step(&mut self) -> Result<CannyStage, ImageError> {
        let src = self.src;
        let config = &self.config;
        let (upper, lower) = config.sanitized_thresholds();

        let started = Instant::now();
        let from = self.stage();

        let next = match &self.state {
            State::Grayscale => {
                let mut gray = Image::from_size_val(src.size(), 0)?;
                gray_from_rgb(src, &mut gray, config.weights)?;
                State::Blur { gray }
            }
            State::Blur { gray } => {
                let mut blurred = Image::from_size_val(gray.size(), 0)?;
                gaussian_blur(
                    gray,
                    &mut blurred,
                    config.blur_sigma,
                    Some(config.blur_kernel_size),
                )?;
                State::Gradient { blurred }
            }
            State::Gradient { blurred } => {
                let (gx, gy) = spatial_gradient(&blurred.cast()?, GradientOperator::Sobel)?;
                State::MagnitudeDirection { gx, gy }
            }
            State::MagnitudeDirection { gx, gy } => {
                let (magnitude, direction) = magnitude_direction(gx, gy)?;
                State::NonMaxSuppression {
                    magnitude,
                    direction,
                }
            }
            State::NonMaxSuppression {
                magnitude,
                direction,
            } => {
                let strong = non_maximum_suppression(magnitude, direction, upper);
                State::Hysteresis {
                    magnitude: magnitude.clone(),
                    direction: direction.clone(),
                    strong,
                }
            }
            State::Hysteresis {
                magnitude,
                direction,
                strong,
            } => {
                let linked = hysteresis(magnitude, direction, strong, lower);
                let edges = Image::new(
                    magnitude.size(),
                    linked.iter().map(|&e| if e { 255 } else { 0 }).collect(),
                )?;
                State::Done { edges }
            }
            State::Done { .. } => return Ok(CannyStage::Done),
        };

        self.state = next;
        log::debug!(
            "canny: {:?} finished in {:?}, next {:?}",
            from,
            started.elapsed(),
            self.stage()
        );

        Ok(self.stage())
    }

    /// Run all remaining stages and return the binary edge map (255 edge, 0 background).
    pub fn finish(mut self) -> Result<Image<u8, 1>, ImageError> {
        loop {
            if let State::Done { edges } = self.state {
                return Ok(edges);
            }
            self.step()?;
        }
    }
}

/// The two neighbours across an edge with the given orientation in `[0, 180)`.
fn direction_neighbors(angle: f64) -> [(i64, i64); 2] {
    if !(22.5..157.5).contains(&angle) {
        [(-1, 0), (1, 0)]
    } else if angle < 67.5 {
        [(-1, -1), (1, 1)]
    } else if angle < 112.5 {
        [(0, -1), (0, 1)]
    } else {
        [(-1, 1), (1, -1)]
    }
}

/// The two neighbours along an edge with the given orientation in `[0, 180)`.
fn tangent_neighbors(angle: f64) -> [(i64, i64); 2] {
    direction_neighbors(angle).map(|(dx, dy)| (-dy, dx))
}

fn non_maximum_suppression(
    magnitude: &Image<f64, 1>,
    direction: &Image<f64, 1>,
    upper: f64,
) -> Vec<bool> {
    let (cols, rows) = (magnitude.cols(), magnitude.rows());
    let mag = magnitude.as_slice();
    let dir = direction.as_slice();

    let mut strong = vec![false; mag.len()];
    for y in 1..rows.saturating_sub(1) {
        for x in 1..cols.saturating_sub(1) {
            let idx = y * cols + x;
            let m = mag[idx];
            if m <= upper {
                continue;
            }
            let is_max = direction_neighbors(dir[idx]).iter().all(|&(dx, dy)| {
                let n = (y as i64 + dy) as usize * cols + (x as i64 + dx) as usize;
                m > mag[n]
            });
            strong[idx] = is_max;
        }
    }
    strong
}

fn hysteresis(
    magnitude: &Image<f64, 1>,
    direction: &Image<f64, 1>,
    strong: &[bool],
    lower: f64,
) -> Vec<bool> {
    let cols = magnitude.cols();
    let mag = magnitude.as_slice();
    let dir = direction.as_slice();
    let index = |x: i64, y: i64| magnitude.contains(x, y).then(|| y as usize * cols + x as usize);

    // strict maximum along its own neighbour pair, ignoring neighbours outside the image
    let is_local_max = |x: i64, y: i64, idx: usize| {
        direction_neighbors(dir[idx])
            .iter()
            .filter_map(|&(dx, dy)| index(x + dx, y + dy))
            .all(|n| mag[idx] > mag[n])
    };

    let mut visited = vec![false; mag.len()];
    let mut edges = vec![false; mag.len()];
    let mut stack = Vec::new();

    for seed in strong.iter().enumerate().filter_map(|(i, &s)| s.then_some(i)) {
        if visited[seed] {
            continue;
        }
        stack.push(((seed % cols) as i64, (seed / cols) as i64));

        while let Some((cx, cy)) = stack.pop() {
            let Some(current) = index(cx, cy) else {
                continue;
            };
            if visited[current] {
                continue;
            }
            visited[current] = true;
            edges[current] = true;

            // follow the edge, not the gradient
            for (dx, dy) in tangent_neighbors(dir[current]) {
                let (nx, ny) = (cx + dx, cy + dy);
                let Some(n) = index(nx, ny) else {
                    continue;
                };
                if visited[n] || mag[n] < lower {
                    continue;
                }
                let diff = (dir[n] - dir[current]).abs();
                if diff.min(180.0 - diff) > MAX_LINK_ANGLE {
                    continue;
                }
                if is_local_max(nx, ny, n) {
                    stack.push((nx, ny));
                }
            }
        }
    }

    edges
}

/// Detect edges with the Canny algorithm.
///
/// Runs the full [`CannyPipeline`] on `src` and writes the binary edge map (255 edge,
/// 0 background) to every channel of `dst`. `dst` is written only after every stage
/// succeeded.
///
/// # Arguments
///
/// * `src` - The source RGB image.
/// * `dst` - The destination image.
/// * `config` - The detector parameters.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
///
/// # Example
///
/// ```
/// use obraz_image::Image;
/// use obraz_imgproc::canny::{canny, CannyConfig};
///
/// // a vertical step with one intermediate column
/// let src = Image::<u8, 3>::from_fn([16, 16].into(), |x, _| match x {
///     0..=6 => [0, 0, 0],
///     7 => [128, 128, 128],
///     _ => [255, 255, 255],
/// });
/// let mut dst = Image::<u8, 3>::from_size_val(src.size(), 0).unwrap();
///
/// canny(&src, &mut dst, &CannyConfig::default()).unwrap();
/// assert_eq!(dst.pixel(7, 8), [255, 255, 255]);
/// assert_eq!(dst.pixel(2, 8), [0, 0, 0]);
/// ```
pub fn canny(
    src: &Image<u8, 3>,
    dst: &mut Image<u8, 3>,
    config: &CannyConfig,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let edges = CannyPipeline::new(src, *config).finish()?;

    parallel::par_iter_rows(&edges, dst, |edge, dst_pixel| {
        dst_pixel.fill(edge[0]);
    });

    Ok(())
}

/// Replace an image by its Canny edge map.
///
/// Any internal failure leaves the image untouched and is logged as a warning.
///
/// # Returns
///
/// Whether the image was modified.
pub fn canny_inplace(image: &mut Image<u8, 3>, config: &CannyConfig) -> bool {
    let result = CannyPipeline::new(image, *config).finish();
    match result {
        Ok(edges) => {
            parallel::par_iter_rows(&edges, image, |edge, dst_pixel| {
                dst_pixel.fill(edge[0]);
            });
            true
        }
        Err(e) => {
            log::warn!("canny: edge detection failed, image left unchanged: {e}");
            false
        }
    }
}
