//! Result ranking and limiting.
//!
//! Results are ordered by the key of a [`SortMethod`], truncated to the peak
//! limit and renumbered from 1. Ties keep ascending id order, so ranking an
//! already ranked list with the same method changes nothing.

use shared::ImageDims;

use crate::options::SortMethod;
use crate::result::FindFociResult;

/// Ranking key of a result.
///
/// # Arguments
/// * `method` - Sort method
/// * `result` - Result to measure
/// * `background` - Background level of the run
/// * `dims` - Image dimensions, used for the XYZ key
pub fn sort_key(method: SortMethod, result: &FindFociResult, background: f64, dims: &ImageDims) -> f64 {
    let count = result.count.max(1) as f64;
    match method {
        SortMethod::Intensity => result.total_intensity,
        SortMethod::Count => result.count as f64,
        SortMethod::MaxValue => result.max_value,
        SortMethod::AverageIntensity => result.average_intensity,
        SortMethod::IntensityMinusBackground => result.total_intensity_above_background,
        SortMethod::AverageIntensityMinusBackground => result.average_intensity_above_background,
        SortMethod::X => result.x as f64,
        SortMethod::Y => result.y as f64,
        SortMethod::Z => result.z as f64,
        SortMethod::SaddleHeight => result.highest_saddle_value,
        SortMethod::CountAboveSaddle => result.count_above_saddle as f64,
        SortMethod::IntensityAboveSaddle => result.intensity_above_saddle,
        SortMethod::AbsoluteHeight => result.height_above_saddle(),
        SortMethod::RelativeHeightAboveBackground => {
            let range = result.max_value - background;
            if range > 0.0 {
                result.height_above_saddle() / range
            } else {
                0.0
            }
        }
        SortMethod::PeakId => result.id as f64,
        SortMethod::Xyz => dims.index(result.x, result.y, result.z) as f64,
        SortMethod::IntensityMinusMin => result.intensity_above_minimum,
        SortMethod::AverageIntensityMinusMin => result.intensity_above_minimum / count,
    }
}

/// Rank, limit and renumber results in place.
///
/// # Arguments
/// * `results` - Results with unique ids
/// * `method` - Sort method; positional keys and `PeakId` sort ascending
/// * `max_peaks` - Maximum number kept, 0 = unlimited
/// * `background` - Background level of the run
/// * `dims` - Image dimensions
///
/// # Returns
/// Table mapping each previous id to its new id (0 when dropped), indexed by
/// the previous id
pub fn rank_results(
    results: &mut Vec<FindFociResult>,
    method: SortMethod,
    max_peaks: usize,
    background: f64,
    dims: &ImageDims,
) -> Vec<u32> {
    for result in results.iter_mut() {
        result.sort_value = sort_key(method, result, background, dims);
    }

    let ascending = method.is_ascending();
    results.sort_by(|a, b| {
        let order = if ascending {
            a.sort_value.total_cmp(&b.sort_value)
        } else {
            b.sort_value.total_cmp(&a.sort_value)
        };
        order.then(a.id.cmp(&b.id))
    });

    if max_peaks > 0 && results.len() > max_peaks {
        log::debug!("Limiting {} results to {max_peaks}", results.len());
        results.truncate(max_peaks);
    }

    let largest = results.iter().map(|r| r.id).max().unwrap_or(0);
    let largest = largest.max(
        results
            .iter()
            .map(|r| r.saddle_neighbour_id)
            .max()
            .unwrap_or(0),
    );
    let mut remap = vec![0u32; largest as usize + 1];
    for (rank, result) in results.iter().enumerate() {
        remap[result.id as usize] = rank as u32 + 1;
    }
    for result in results.iter_mut() {
        result.id = remap[result.id as usize];
        result.saddle_neighbour_id = remap[result.saddle_neighbour_id as usize];
    }
    remap
}
