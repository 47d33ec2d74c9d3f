use std::f64::consts::PI;

use obraz_image::ImageError;

/// A square two dimensional convolution kernel.
///
/// The weights are stored row-major: the weight applied to the sample at offset
/// `(kx - radius, ky - radius)` is `weights[ky * size + kx]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    size: usize,
    weights: Vec<f64>,
}

impl Kernel {
    /// Create a kernel from row-major weights.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or `weights` does not hold `size * size` values.
    pub fn new(size: usize, weights: Vec<f64>) -> Result<Self, ImageError> {
        if size == 0 || weights.len() != size * size {
            return Err(ImageError::InvalidKernelSize(
                size,
                size * size,
                weights.len(),
            ));
        }
        Ok(Self { size, weights })
    }

    /// Create a kernel from a caller supplied matrix of rows.
    ///
    /// Returns `None` when the matrix is empty, not square, or has an even size, since
    /// such a kernel has no centre pixel.
    ///
    /// # Example
    ///
    /// ```
    /// use obraz_imgproc::filter::kernels::Kernel;
    ///
    /// let k = Kernel::from_matrix(&[vec![0.0, 1.0, 0.0], vec![1.0, -4.0, 1.0], vec![0.0, 1.0, 0.0]]);
    /// assert!(k.is_some());
    ///
    /// assert!(Kernel::from_matrix(&[vec![1.0, 0.0], vec![0.0, 1.0]]).is_none());
    /// assert!(Kernel::from_matrix(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0]]).is_none());
    /// ```
    pub fn from_matrix(rows: &[Vec<f64>]) -> Option<Self> {
        let size = rows.len();
        if size == 0 || size % 2 == 0 || rows.iter().any(|row| row.len() != size) {
            return None;
        }
        let weights = rows.iter().flatten().copied().collect();
        Some(Self { size, weights })
    }

    fn from_fn(size: usize, f: impl Fn(i64, i64) -> f64) -> Self {
        let center = (size / 2) as i64;
        let mut weights = Vec::with_capacity(size * size);
        for ky in 0..size as i64 {
            for kx in 0..size as i64 {
                weights.push(f(kx - center, ky - center));
            }
        }
        Self { size, weights }
    }

    /// Side length of the kernel.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Offset of the anchor from the top-left weight.
    pub fn radius(&self) -> usize {
        self.size / 2
    }

    /// The row-major weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// The weight at column `kx`, row `ky`.
    #[inline]
    pub fn get(&self, kx: usize, ky: usize) -> f64 {
        self.weights[ky * self.size + kx]
    }

    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Return the kernel with every weight negated.
    pub fn negated(mut self) -> Self {
        self.weights.iter_mut().for_each(|w| *w = -*w);
        self
    }

    /// Create a normalized gaussian kernel, deriving the size from `sigma`.
    ///
    /// Returns `None` when `sigma` is not positive.
    ///
    /// # Example
    ///
    /// ```
    /// use obraz_imgproc::filter::kernels::Kernel;
    ///
    /// let k = Kernel::gaussian(1.0).unwrap();
    /// assert_eq!(k.size(), 7);
    /// assert!((k.sum() - 1.0).abs() < 1e-9);
    /// ```
    pub fn gaussian(sigma: f64) -> Option<Self> {
        if !(sigma > 0.0) {
            return None;
        }
        Self::gaussian_with_size(sigma, kernel_size_from_sigma(sigma))
    }

    /// Create a normalized gaussian kernel of the given size.
    ///
    /// Even sizes are incremented and sizes below 3 are raised to 3. Returns `None`
    /// when `sigma` is not positive or `size` is zero.
    pub fn gaussian_with_size(sigma: f64, size: usize) -> Option<Self> {
        if !(sigma > 0.0) {
            return None;
        }
        let size = odd_kernel_size(size)?;
        let two_sigma_sq = 2.0 * sigma * sigma;

        let mut kernel = Self::from_fn(size, |dx, dy| {
            let r2 = (dx * dx + dy * dy) as f64;
            (-r2 / two_sigma_sq).exp() / (PI * two_sigma_sq)
        });

        // normalize the kernel
        let norm = kernel.sum();
        kernel.weights.iter_mut().for_each(|w| *w /= norm);

        Some(kernel)
    }

    /// Create a uniform (box) kernel with every weight equal to `1 / size²`.
    ///
    /// Returns `None` when `size` is zero.
    pub fn uniform(size: usize) -> Option<Self> {
        let size = odd_kernel_size(size)?;
        let value = 1.0 / (size * size) as f64;
        Some(Self {
            size,
            weights: vec![value; size * size],
        })
    }

    /// Create a discrete laplacian kernel with a positive centre.
    ///
    /// Sizes 3 and 5 use the classic 4-neighbour stencils; other sizes place a 4-neighbour
    /// cross at the centre of an otherwise zero kernel. Returns `None` when `size` is zero.
    pub fn laplacian(size: usize) -> Option<Self> {
        let size = odd_kernel_size(size)?;
        let kernel = match size {
            3 => Self {
                size,
                #[rustfmt::skip]
                weights: vec![
                     0.0, -1.0,  0.0,
                    -1.0,  4.0, -1.0,
                     0.0, -1.0,  0.0,
                ],
            },
            5 => Self {
                size,
                #[rustfmt::skip]
                weights: vec![
                     0.0,  0.0, -1.0,  0.0,  0.0,
                     0.0, -1.0, -2.0, -1.0,  0.0,
                    -1.0, -2.0, 16.0, -2.0, -1.0,
                     0.0, -1.0, -2.0, -1.0,  0.0,
                     0.0,  0.0, -1.0,  0.0,  0.0,
                ],
            },
            _ => Self::from_fn(size, |dx, dy| match (dx.abs(), dy.abs()) {
                (0, 0) => 4.0,
                (1, 0) | (0, 1) => -1.0,
                _ => 0.0,
            }),
        };
        Some(kernel)
    }

    /// Create a discrete laplacian kernel with a negative centre.
    ///
    /// Responds to dark lines on a bright background. Returns `None` when `size` is zero.
    pub fn laplacian_negative(size: usize) -> Option<Self> {
        Self::laplacian(size).map(Self::negated)
    }

    /// Create an unnormalized laplacian of gaussian kernel, deriving the size from `sigma`.
    ///
    /// `LoG(x, y) = -1 / (π σ⁴) · (1 - r² / 2σ²) · exp(-r² / 2σ²)`
    ///
    /// Returns `None` when `sigma` is not positive.
    pub fn laplacian_of_gaussian(sigma: f64) -> Option<Self> {
        if !(sigma > 0.0) {
            return None;
        }
        let size = kernel_size_from_sigma(sigma);
        let sigma2 = sigma * sigma;
        let sigma4 = sigma2 * sigma2;

        Some(Self::from_fn(size, |dx, dy| {
            let r2 = (dx * dx + dy * dy) as f64;
            let gaussian = (-r2 / (2.0 * sigma2)).exp();
            -1.0 / (PI * sigma4) * (1.0 - r2 / (2.0 * sigma2)) * gaussian
        }))
    }
}

/// Coerce a requested kernel size to an odd size of at least 3.
///
/// Returns `None` for a zero size.
pub fn odd_kernel_size(size: usize) -> Option<usize> {
    match size {
        0 => None,
        s if s % 2 == 0 => Some((s + 1).max(3)),
        s => Some(s.max(3)),
    }
}

/// Kernel size covering ±3σ: `max(3, odd(trunc(6σ + 1)))`.
pub fn kernel_size_from_sigma(sigma: f64) -> usize {
    let size = (6.0 * sigma + 1.0) as usize;
    let size = if size % 2 == 0 { size + 1 } else { size };
    size.max(3)
}

/// First order gradient operators with a fixed kernel pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GradientOperator {
    /// 2x2 diagonal differences.
    Roberts,
    /// 3x3 central differences with uniform smoothing.
    Prewitt,
    /// 3x3 central differences with binomial smoothing.
    Sobel,
}

impl GradientOperator {
    /// The `(gx, gy)` kernel pair of the operator.
    pub fn kernels(&self) -> (Kernel, Kernel) {
        #[rustfmt::skip]
        let (size, kx, ky) = match self {
            GradientOperator::Roberts => (
                2,
                vec![
                    1.0,  0.0,
                    0.0, -1.0,
                ],
                vec![
                     0.0, 1.0,
                    -1.0, 0.0,
                ],
            ),
            GradientOperator::Prewitt => (
                3,
                vec![
                    -1.0, 0.0, 1.0,
                    -1.0, 0.0, 1.0,
                    -1.0, 0.0, 1.0,
                ],
                vec![
                    -1.0, -1.0, -1.0,
                     0.0,  0.0,  0.0,
                     1.0,  1.0,  1.0,
                ],
            ),
            GradientOperator::Sobel => (
                3,
                vec![
                    -1.0, 0.0, 1.0,
                    -2.0, 0.0, 2.0,
                    -1.0, 0.0, 1.0,
                ],
                vec![
                    -1.0, -2.0, -1.0,
                     0.0,  0.0,  0.0,
                     1.0,  2.0,  1.0,
                ],
            ),
        };
        (
            Kernel { size, weights: kx },
            Kernel { size, weights: ky },
        )
    }
}

/// The kernel families produced by [`generate_kernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KernelKind {
    /// Normalized gaussian, size derived from sigma unless given.
    Gaussian {
        /// Standard deviation of the gaussian.
        sigma: f64,
        /// Explicit kernel size.
        size: Option<usize>,
    },
    /// Box kernel.
    Uniform {
        /// Kernel size.
        size: usize,
    },
    /// Laplacian with a positive centre.
    Laplacian {
        /// Kernel size.
        size: usize,
    },
    /// Laplacian with a negative centre.
    LaplacianNegative {
        /// Kernel size.
        size: usize,
    },
    /// Unnormalized laplacian of gaussian.
    LaplacianOfGaussian {
        /// Standard deviation of the gaussian.
        sigma: f64,
    },
}

/// Generate a kernel of the given kind.
///
/// Returns `None` for invalid parameters (zero size, non-positive sigma).
///
/// # Example
///
/// ```
/// use obraz_imgproc::filter::kernels::{generate_kernel, KernelKind};
///
/// let k = generate_kernel(KernelKind::Uniform { size: 4 }).unwrap();
/// assert_eq!(k.size(), 5);
///
/// assert!(generate_kernel(KernelKind::Gaussian { sigma: -1.0, size: None }).is_none());
/// ```
pub fn generate_kernel(kind: KernelKind) -> Option<Kernel> {
    match kind {
        KernelKind::Gaussian { sigma, size: None } => Kernel::gaussian(sigma),
        KernelKind::Gaussian {
            sigma,
            size: Some(size),
        } => Kernel::gaussian_with_size(sigma, size),
        KernelKind::Uniform { size } => Kernel::uniform(size),
        KernelKind::Laplacian { size } => Kernel::laplacian(size),
        KernelKind::LaplacianNegative { size } => Kernel::laplacian_negative(size),
        KernelKind::LaplacianOfGaussian { sigma } => Kernel::laplacian_of_gaussian(sigma),
    }
}
