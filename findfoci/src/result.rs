//! Result records returned by the processor.

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use shared::image_proc::Aabb3;

use crate::statistics::FindFociStatistics;

/// Where a peak's maximum lies relative to the input mask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaskState {
    /// No mask was supplied
    #[default]
    NoMask,
    Inside,
    Outside,
}

/// One detected peak.
///
/// `x`, `y` and `z` locate the maximum pixel on the search image; `centre`
/// carries the refined sub-pixel position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindFociResult {
    /// Rank in the final list, starting at 1
    pub id: u32,
    pub x: usize,
    pub y: usize,
    /// Zero-indexed slice
    pub z: usize,
    pub centre: [f64; 3],
    pub count: usize,
    pub total_intensity: f64,
    pub average_intensity: f64,
    pub max_value: f64,
    /// Highest saddle to a neighbouring peak, 0 when isolated
    pub highest_saddle_value: f64,
    /// Final id of the neighbour across the highest saddle, 0 when none
    pub saddle_neighbour_id: u32,
    pub count_above_saddle: usize,
    pub intensity_above_saddle: f64,
    pub total_intensity_above_background: f64,
    pub average_intensity_above_background: f64,
    /// Sum of (v - image minimum) over the peak
    pub intensity_above_minimum: f64,
    pub bounds: Aabb3,
    /// Key the list was ranked by
    pub sort_value: f64,
    /// Connected mask object holding the maximum, 0 when unassigned
    pub object_id: u32,
    pub mask_state: MaskState,
}

impl FindFociResult {
    /// Height of the maximum above the highest saddle
    pub fn height_above_saddle(&self) -> f64 {
        self.max_value - self.highest_saddle_value
    }
}

/// Everything produced by one processor run.
#[derive(Debug, Clone, Default)]
pub struct FindFociResults {
    /// Ranked peaks, ids `1..=len`
    pub results: Vec<FindFociResult>,
    pub statistics: FindFociStatistics,
    /// Final peak id per pixel with shape (depth, height, width)
    pub labels: Option<Array3<u32>>,
    /// Output mask with shape (depth, height, width)
    pub mask: Option<Array3<u32>>,
    /// Candidate maxima before merging
    pub candidate_count: usize,
    pub merge_count: usize,
}

impl FindFociResults {
    /// Results with only statistics, used when nothing was found
    pub(crate) fn empty(statistics: FindFociStatistics) -> Self {
        Self {
            statistics,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
