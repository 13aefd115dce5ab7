//! Shared image utilities used by the FindFoci crates.
//!
//! Contains image geometry, running statistics, histograms with the
//! auto-threshold family, Gaussian blur and label-image analysis. Nothing here
//! knows about peaks; the engine in `findfoci` builds on these pieces.

pub mod image_proc;
pub mod image_size;
pub mod stats_scan;

pub use image_size::ImageDims;
pub use stats_scan::{RunningStats, StatsError};
