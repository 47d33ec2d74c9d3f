/// An error type for the image and image processing crates.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// Error when the data length does not match the image size.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when two images that must match have different sizes.
    #[error("Image size ({0}x{1}) does not match the expected size ({2}x{3})")]
    InvalidImageSize(usize, usize, usize, usize),

    /// Error when a pixel coordinate is outside the image.
    #[error("Pixel coordinate ({0}, {1}) is out of bounds ({2}x{3})")]
    PixelIndexOutOfBounds(usize, usize, usize, usize),

    /// Error when a channel index is out of bounds.
    #[error("Channel index ({0}) is out of bounds ({1})")]
    ChannelIndexOutOfBounds(usize, usize),

    /// Error when a pixel value cannot be cast to the requested type.
    #[error("Failed to cast pixel data to {0}")]
    CastError(String),

    /// Error when the number of histogram bins is invalid.
    #[error("Invalid number of histogram bins ({0}), expected 1..=256")]
    InvalidHistogramBins(usize),

    /// Error when kernel weights do not form a square matrix.
    #[error("Kernel of size {0} expects {1} weights, got {2}")]
    InvalidKernelSize(usize, usize, usize),

    /// Error when a long running operation observed its cancel token.
    #[error("Operation was cancelled")]
    Cancelled,
}
