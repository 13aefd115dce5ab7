//! Image processing module for intensity analysis
//!
//! This module provides the histogram, thresholding, blurring and labelling
//! utilities needed to prepare an image for peak finding and to analyse masks.

pub mod aabb;
pub mod blur;
pub mod histogram;
pub mod morphology;
pub mod neighbourhood;
pub mod objects;
pub mod thresholding;

// Re-export key functionality for easier access
pub use aabb::Aabb3;
pub use blur::{gaussian_blur_slices, gaussian_kernel_1d};
pub use histogram::{round_half_up, Histogram, HistogramError, FLOAT_HISTOGRAM_BINS};
pub use morphology::{erode_labels, expand_labels};
pub use neighbourhood::{Connectivity, Neighbourhood, FULL_OFFSETS};
pub use objects::{ObjectAnalyzer, ObjectError};
pub use thresholding::{auto_threshold, threshold_bin, ThresholdMethod};
