//! Error types for the FindFoci engine.

use shared::image_proc::{HistogramError, ObjectError};
use shared::ImageDims;
use thiserror::Error;

/// Errors raised by [`crate::FindFociProcessor`] and its inputs.
#[derive(Error, Debug)]
pub enum FindFociError {
    #[error("Unsupported bit depth {0} (expected 8, 16 or 32)")]
    UnsupportedBitDepth(u32),

    #[error("Mask dimensions {mask} do not match image dimensions {image}")]
    DimensionMismatch { image: ImageDims, mask: ImageDims },

    #[error("Image has zero size ({0})")]
    EmptyImage(ImageDims),

    #[error("Buffer holds {actual} samples but {dims} requires {expected}")]
    BufferSizeMismatch {
        dims: ImageDims,
        expected: usize,
        actual: usize,
    },

    #[error("Histogram error: {0}")]
    Histogram(#[from] HistogramError),

    #[error("Object analysis error: {0}")]
    Objects(#[from] ObjectError),

    #[error("Options file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Cooperative cancellation was requested; no partial results are returned.
    #[error("Processing was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, FindFociError>;
