//! Image statistics and threshold levels.
//!
//! Statistics are accumulated exactly from the pixel values; the histogram of
//! the background region is only built when an auto-threshold needs it. The
//! level functions at the bottom are pure and shared by growth and merging.

use serde::{Deserialize, Serialize};
use shared::image_proc::{auto_threshold, Histogram, ThresholdMethod, FLOAT_HISTOGRAM_BINS};
use shared::RunningStats;

use crate::error::Result;
use crate::options::{
    BackgroundMethod, FindFociProcessorOptions, PeakMethod, SearchMethod, StatisticsMethod,
};
use crate::pixel::FociMask;

/// Summary of the analysed image.
///
/// The *region* is the inside of the mask, or the whole image without one. The
/// *background region* is chosen by [`StatisticsMethod`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindFociStatistics {
    pub region_minimum: f64,
    pub region_maximum: f64,
    pub region_average: f64,
    pub region_std_dev: f64,
    pub region_total: f64,
    pub region_count: usize,
    /// Background level used for the search
    pub background: f64,
    pub background_region_minimum: f64,
    pub background_region_maximum: f64,
    pub background_region_average: f64,
    pub background_region_std_dev: f64,
    pub background_region_count: usize,
    /// Minimum over the whole image, ignoring the mask
    pub image_minimum: f64,
    /// Sum of (v - background) over region pixels above the background
    pub total_above_background: f64,
    /// Sum of (v - image minimum) over region pixels
    pub total_above_image_minimum: f64,
}

/// Compute statistics and the background level for a working image.
///
/// # Arguments
/// * `values` - Working image (after any pre-blur)
/// * `mask` - Optional region mask with matching dimensions
/// * `options` - Normalised processor options
/// * `bit_depth` - Sample bit depth of the input, selects the histogram layout
pub fn compute_statistics(
    values: &[f32],
    mask: Option<&FociMask>,
    options: &FindFociProcessorOptions,
    bit_depth: u32,
) -> Result<FindFociStatistics> {
    let image = RunningStats::from_values(values.iter().map(|&v| v as f64));

    let in_region = |index: usize| mask.map_or(true, |m| m.is_inside(index));
    let region = RunningStats::from_values(
        values
            .iter()
            .enumerate()
            .filter(|(i, _)| in_region(*i))
            .map(|(_, &v)| v as f64),
    );

    let in_background = |index: usize| match (mask, options.statistics_method) {
        (None, _) | (_, StatisticsMethod::All) => true,
        (Some(m), StatisticsMethod::Inside) => m.is_inside(index),
        (Some(m), StatisticsMethod::Outside) => !m.is_inside(index),
    };
    let mut background_values: Vec<f64> = values
        .iter()
        .enumerate()
        .filter(|(i, _)| in_background(*i))
        .map(|(_, &v)| v as f64)
        .collect();
    if background_values.is_empty() {
        log::warn!(
            "Background region ({:?}) is empty, using the whole image",
            options.statistics_method
        );
        background_values = values.iter().map(|&v| v as f64).collect();
    }
    let background_region = RunningStats::from_values(background_values.iter().copied());

    let mut stats = FindFociStatistics {
        region_minimum: region.min().unwrap_or(0.0),
        region_maximum: region.max().unwrap_or(0.0),
        region_average: region.mean().unwrap_or(0.0),
        region_std_dev: region.std_dev().unwrap_or(0.0),
        region_total: region.sum(),
        region_count: region.count(),
        background: 0.0,
        background_region_minimum: background_region.min().unwrap_or(0.0),
        background_region_maximum: background_region.max().unwrap_or(0.0),
        background_region_average: background_region.mean().unwrap_or(0.0),
        background_region_std_dev: background_region.std_dev().unwrap_or(0.0),
        background_region_count: background_region.count(),
        image_minimum: image.min().unwrap_or(0.0),
        total_above_background: 0.0,
        total_above_image_minimum: 0.0,
    };

    let histogram = if options.background_method == BackgroundMethod::AutoThreshold
        && background_region.count() > 0
    {
        Some(build_histogram(&background_values, &stats, bit_depth)?)
    } else {
        None
    };

    stats.background = background_level(
        options.background_method,
        options.background_parameter,
        options.threshold_method,
        &stats,
        histogram.as_ref(),
    );

    let (background, image_minimum) = (stats.background, stats.image_minimum);
    for (_, &v) in values.iter().enumerate().filter(|(i, _)| in_region(*i)) {
        let v = v as f64;
        if v > background {
            stats.total_above_background += v - background;
        }
        stats.total_above_image_minimum += v - image_minimum;
    }

    log::debug!(
        "Region {} px [{}, {}] mean {:.3}; background {:.3} ({:?})",
        stats.region_count,
        stats.region_minimum,
        stats.region_maximum,
        stats.region_average,
        stats.background,
        options.background_method
    );

    Ok(stats)
}

fn build_histogram(values: &[f64], stats: &FindFociStatistics, bit_depth: u32) -> Result<Histogram> {
    let histogram = match bit_depth {
        8 | 16 => Histogram::integer(values.iter().copied(), bit_depth)?,
        _ => Histogram::from_range(
            values.iter().copied(),
            stats.background_region_minimum,
            stats.background_region_maximum,
            FLOAT_HISTOGRAM_BINS,
        )?,
    };
    Ok(histogram)
}

/// Background level for a method.
///
/// `statistics` must already hold the region and background region figures;
/// its `background` field is ignored. A missing histogram gives an
/// auto-threshold of 0.
pub fn background_level(
    method: BackgroundMethod,
    parameter: f64,
    threshold_method: ThresholdMethod,
    statistics: &FindFociStatistics,
    histogram: Option<&Histogram>,
) -> f64 {
    match method {
        BackgroundMethod::None => 0.0,
        BackgroundMethod::Absolute => parameter.max(0.0),
        BackgroundMethod::AutoThreshold => histogram
            .map(|h| auto_threshold(threshold_method, h))
            .unwrap_or(0.0),
        BackgroundMethod::Mean => statistics.background_region_average,
        BackgroundMethod::StdDevAboveMean => {
            statistics.background_region_average
                + parameter.max(0.0) * statistics.background_region_std_dev
        }
        BackgroundMethod::MinMaskOrRoi => statistics.region_minimum,
    }
}

/// Lowest value a peak with maximum `v0` may grow down to
pub fn search_threshold(method: SearchMethod, parameter: f64, background: f64, v0: f64) -> f64 {
    match method {
        SearchMethod::AboveBackground => background,
        SearchMethod::FractionOfPeakMinusBackground => {
            background + parameter.clamp(0.0, 1.0) * (v0 - background)
        }
        SearchMethod::HalfPeakValue => background + 0.5 * (v0 - background),
    }
}

/// Minimum height above the highest saddle for a peak with maximum `v0`.
///
/// Never less than 1.
pub fn peak_height(method: PeakMethod, parameter: f64, background: f64, v0: f64) -> f64 {
    let height = match method {
        PeakMethod::Absolute => parameter,
        PeakMethod::Relative => parameter * v0,
        PeakMethod::RelativeAboveBackground => parameter * (v0 - background),
    };
    height.max(1.0)
}
