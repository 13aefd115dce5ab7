//! FindFoci peak detection for 2D and 3D intensity images
//!
//! Finds local intensity maxima, grows each into the basin of pixels that
//! climb to it, and merges neighbouring peaks whose separating saddle is too
//! shallow or whose territory is too small. Surviving peaks are measured,
//! ranked and returned with image statistics and optional label and mask
//! buffers.
//!
//! ```no_run
//! use findfoci::{FindFociOptions, FindFociProcessor, FindFociProcessorOptions, FociImage};
//! use shared::ImageDims;
//!
//! let data = vec![0u16; 64 * 64];
//! let image = FociImage::new(&data, ImageDims::from_width_height(64, 64)).unwrap();
//! let processor = FindFociProcessor::new(FindFociProcessorOptions::default());
//! let found = processor.exec(&image, None, &FindFociOptions::default()).unwrap();
//! for peak in &found.results {
//!     println!("{} at ({}, {}) total {}", peak.id, peak.x, peak.y, peak.total_intensity);
//! }
//! ```

mod centre;
pub mod error;
mod growth;
pub mod mask;
mod maxima;
mod merge;
pub mod objects;
pub mod options;
pub mod pixel;
mod processor;
pub mod ranking;
pub mod result;
mod saddle;
pub mod statistics;
pub mod types;

pub use centre::{GaussianFitter, LogParabolaFitter};
pub use error::{FindFociError, Result};
pub use growth::{Cancellation, NeverCancel};
pub use mask::MAXIMA_MARKER;
pub use options::{
    BackgroundMethod, CentreMethod, FindFociOptions, FindFociProcessorOptions, MaskMethod,
    PeakMethod, SearchMethod, SortMethod, StatisticsMethod,
};
pub use pixel::{FociImage, FociMask, FociPixel, ImageBuffer};
pub use processor::FindFociProcessor;
pub use result::{FindFociResult, FindFociResults, MaskState};
pub use saddle::FindFociSaddle;
pub use shared::image_proc::{Connectivity, ThresholdMethod};
pub use statistics::FindFociStatistics;
