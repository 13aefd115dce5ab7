//! The FindFoci processor.
//!
//! One [`FindFociProcessor::exec`] call runs the whole pipeline on a single
//! image:
//!
//! 1. Validate the inputs and normalise the options
//! 2. Build the `f32` search image, optionally pre-blurred
//! 3. Measure statistics and the background level
//! 4. Exclude pixels outside the mask or below the background
//! 5. Find candidate maxima and grow a region from each
//! 6. Find saddles, merge shallow or small peaks and apply the filters
//! 7. Refine centres, rank and limit the results
//! 8. Build the requested label buffer, mask and object assignments
//!
//! All working buffers belong to the call, so one processor can serve many
//! images, including from several threads at once.

use ndarray::Array3;
use rayon::prelude::*;
use shared::image_proc::{gaussian_blur_slices, Neighbourhood};
use shared::ImageDims;

use crate::centre::{CentreFinder, GaussianFitter, LogParabolaFitter};
use crate::error::{FindFociError, Result};
use crate::growth::{grow_regions, steepest_ascent, Cancellation, GrowthLevels, NeverCancel};
use crate::mask::{build_mask, MaskSource};
use crate::maxima::find_maxima;
use crate::merge::{MergeSettings, MergedPeak, PeakMerger};
use crate::objects::{assign_mask_state, assign_objects};
use crate::options::{BackgroundMethod, FindFociOptions, FindFociProcessorOptions, MaskMethod};
use crate::pixel::{FociImage, FociMask, FociPixel, ImageBuffer};
use crate::ranking::rank_results;
use crate::result::{FindFociResult, FindFociResults, MaskState};
use crate::saddle::find_saddles;
use crate::statistics::compute_statistics;
use crate::types::{PixelTypes, EXCLUDED};

/// Peak finder configured with search options and a Gaussian fitter.
pub struct FindFociProcessor {
    options: FindFociProcessorOptions,
    fitter: Box<dyn GaussianFitter>,
}

impl std::fmt::Debug for FindFociProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FindFociProcessor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for FindFociProcessor {
    fn default() -> Self {
        Self::new(FindFociProcessorOptions::default())
    }
}

impl FindFociProcessor {
    /// Create a processor using [`LogParabolaFitter`] for Gaussian centres
    pub fn new(options: FindFociProcessorOptions) -> Self {
        Self {
            options,
            fitter: Box::new(LogParabolaFitter),
        }
    }

    /// Replace the Gaussian fitter
    pub fn with_fitter(mut self, fitter: impl GaussianFitter + 'static) -> Self {
        self.fitter = Box::new(fitter);
        self
    }

    pub fn options(&self) -> &FindFociProcessorOptions {
        &self.options
    }

    /// Find peaks in an image.
    ///
    /// # Arguments
    /// * `image` - Input samples
    /// * `mask` - Optional region mask with the image's dimensions
    /// * `output` - Mask, label buffer and object options
    ///
    /// # Errors
    /// `DimensionMismatch` when the mask does not match the image
    pub fn exec<T: FociPixel>(
        &self,
        image: &FociImage<T>,
        mask: Option<&FociMask>,
        output: &FindFociOptions,
    ) -> Result<FindFociResults> {
        self.exec_with_cancellation(image, mask, output, &NeverCancel)
    }

    /// Find peaks in a dynamically typed buffer.
    pub fn exec_buffer(
        &self,
        buffer: &ImageBuffer,
        mask: Option<&FociMask>,
        output: &FindFociOptions,
    ) -> Result<FindFociResults> {
        match buffer {
            ImageBuffer::U8 { data, dims } => self.exec(&FociImage::new(data, *dims)?, mask, output),
            ImageBuffer::U16 { data, dims } => self.exec(&FociImage::new(data, *dims)?, mask, output),
            ImageBuffer::F32 { data, dims } => self.exec(&FociImage::new(data, *dims)?, mask, output),
        }
    }

    /// Process independent images in parallel, one result per image in order.
    pub fn exec_many<T: FociPixel>(
        &self,
        images: &[FociImage<T>],
        output: &FindFociOptions,
    ) -> Vec<Result<FindFociResults>> {
        images
            .par_iter()
            .map(|image| self.exec(image, None, output))
            .collect()
    }

    /// Find peaks, polling `cancel` between peaks during region growing.
    ///
    /// # Errors
    /// * `DimensionMismatch` when the mask does not match the image
    /// * `Cancelled` when `cancel` fires; no partial results are returned
    pub fn exec_with_cancellation<T: FociPixel>(
        &self,
        image: &FociImage<T>,
        mask: Option<&FociMask>,
        output: &FindFociOptions,
        cancel: &dyn Cancellation,
    ) -> Result<FindFociResults> {
        let dims = *image.dims();
        if let Some(m) = mask {
            if *m.dims() != dims {
                return Err(FindFociError::DimensionMismatch {
                    image: dims,
                    mask: *m.dims(),
                });
            }
        }
        let options = self.options.normalised();

        let original = image.to_working();
        let mut search = original.clone();
        if options.gaussian_blur > 0.0 {
            gaussian_blur_slices(&mut search, &dims, options.gaussian_blur);
            if T::is_integer() {
                search.iter_mut().for_each(|v| *v = T::snap(*v));
            }
        }

        let statistics = compute_statistics(&search, mask, &options, T::BIT_DEPTH)?;
        let background = statistics.background;
        // Without a background every region pixel stays searchable, even below zero
        let search_background = if options.background_method == BackgroundMethod::None {
            background.min(statistics.region_minimum)
        } else {
            background
        };

        let mut types = PixelTypes::new(search.len());
        for (index, &v) in search.iter().enumerate() {
            let outside = mask.is_some_and(|m| !m.is_inside(index));
            // NaN samples compare false and are excluded
            if outside || !(v as f64 >= search_background) {
                types.set(index, EXCLUDED);
            }
        }

        let hood = Neighbourhood::full(dims);
        let maxima = find_maxima(&search, &mut types, &hood);
        let candidate_count = maxima.len();
        if maxima.is_empty() {
            log::info!("No maxima above background {background} in {dims}");
            return Ok(FindFociResults::empty(statistics));
        }

        let directions = steepest_ascent(&search, &types, &hood);
        let levels = GrowthLevels {
            background,
            search_background,
            search_method: options.search_method,
            search_parameter: options.search_parameter,
        };
        let (assigned, regions) =
            grow_regions(&search, &types, &directions, &hood, &maxima, levels, cancel)?;
        let saddles = find_saddles(&search, &assigned, &mut types, &hood, regions.len());

        let mut merger = PeakMerger::new(
            &search,
            &assigned,
            &hood,
            regions,
            saddles,
            MergeSettings::from_options(&options, background),
        );
        merger.run();
        let discarded = merger.filter();
        let outcome = merger.finish(discarded);

        let finder = CentreFinder {
            search: &search,
            original: &original,
            owners: &outcome.owners,
            dims,
            background,
            method: options.centre_method,
            parameter: options.centre_parameter,
            fitter: self.fitter.as_ref(),
        };
        let mut results: Vec<FindFociResult> = outcome
            .peaks
            .iter()
            .map(|peak| describe_peak(peak, &search, &finder, statistics.image_minimum))
            .collect();

        assign_mask_state(&mut results, mask);
        let remap = rank_results(
            &mut results,
            options.sort_method,
            options.max_peaks,
            background,
            &dims,
        );

        let mut found = FindFociResults {
            results,
            statistics,
            labels: None,
            mask: None,
            candidate_count,
            merge_count: outcome.merge_count,
        };

        if output.keep_label_buffer || output.mask_method != MaskMethod::None {
            let labels: Vec<u32> = outcome
                .owners
                .iter()
                .map(|&id| remap.get(id as usize).copied().unwrap_or(0))
                .collect();

            let source = MaskSource {
                values: &search,
                labels: &labels,
                results: &found.results,
                dims,
                background,
                fraction: options.fraction_parameter,
            };
            if let Some(mask) = build_mask(output.mask_method, &source, output.mark_maxima_in_mask) {
                found.mask = Some(to_array(mask, &dims)?);
            }
            if output.keep_label_buffer {
                found.labels = Some(to_array(labels, &dims)?);
            }
        }

        if output.assign_objects {
            match mask {
                Some(m) => {
                    assign_objects(&mut found.results, m, output.object_connectivity)?;
                }
                None => log::warn!("Object assignment requested without a mask"),
            }
        }

        log::info!(
            "Found {} peaks from {candidate_count} candidates ({} merged, {} discarded) in {dims}",
            found.results.len(),
            outcome.merge_count,
            outcome.discarded_count
        );
        Ok(found)
    }
}

fn to_array(data: Vec<u32>, dims: &ImageDims) -> Result<Array3<u32>> {
    Ok(Array3::from_shape_vec((dims.depth, dims.height, dims.width), data)?)
}

/// Result record for a surviving peak, before ranking.
fn describe_peak(
    peak: &MergedPeak,
    values: &[f32],
    finder: &CentreFinder,
    image_minimum: f64,
) -> FindFociResult {
    let region = &peak.region;
    let (x, y, z) = finder.dims.coords(region.max_index);
    let (saddle_value, saddle_id) = peak
        .saddles
        .first()
        .map(|s| (s.value, s.id))
        .unwrap_or((0.0, 0));

    let mut count_above_saddle = 0;
    let mut intensity_above_saddle = 0.0;
    for &p in &region.pixels {
        let v = values[p] as f64;
        if v > saddle_value {
            count_above_saddle += 1;
            intensity_above_saddle += v - saddle_value;
        }
    }

    let count = region.count.max(1) as f64;
    FindFociResult {
        id: region.id,
        x,
        y,
        z,
        centre: finder.centre(region),
        count: region.count,
        total_intensity: region.total,
        average_intensity: region.total / count,
        max_value: region.max_value,
        highest_saddle_value: saddle_value,
        saddle_neighbour_id: saddle_id,
        count_above_saddle,
        intensity_above_saddle,
        total_intensity_above_background: region.total_above_background,
        average_intensity_above_background: region.total_above_background / count,
        intensity_above_minimum: region.total - region.count as f64 * image_minimum,
        bounds: region.bounds,
        sort_value: 0.0,
        object_id: 0,
        mask_state: MaskState::NoMask,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{SearchMethod, SortMethod};

    fn plain_options() -> FindFociProcessorOptions {
        FindFociProcessorOptions {
            background_method: BackgroundMethod::None,
            search_method: SearchMethod::AboveBackground,
            min_size: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_mask_dimension_mismatch() {
        let data = vec![0u8; 16];
        let image = FociImage::new(&data, ImageDims::from_width_height(4, 4)).unwrap();
        let mask_data = vec![1u32; 9];
        let mask = FociMask::new(&mask_data, ImageDims::from_width_height(3, 3)).unwrap();
        let result = FindFociProcessor::new(plain_options()).exec(
            &image,
            Some(&mask),
            &FindFociOptions::default(),
        );
        assert!(matches!(result, Err(FindFociError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_flat_image_is_a_single_plateau() {
        let data = vec![7u8; 9];
        let image = FociImage::new(&data, ImageDims::from_width_height(3, 3)).unwrap();
        let found = FindFociProcessor::new(plain_options())
            .exec(&image, None, &FindFociOptions::default())
            .unwrap();
        assert_eq!(found.candidate_count, 1);
        assert_eq!(found.results.len(), 1);
        assert_eq!(found.results[0].count, 9);
        assert_eq!((found.results[0].x, found.results[0].y), (1, 1));
    }

    #[test]
    fn test_no_background_finds_negative_peaks() {
        let dims = ImageDims::from_width_height(5, 5);
        let mut data = vec![-10.0f32; dims.pixel_count()];
        data[dims.index(2, 2, 0)] = -2.0;
        let image = FociImage::new(&data, dims).unwrap();
        let found = FindFociProcessor::new(plain_options())
            .exec(&image, None, &FindFociOptions::default())
            .unwrap();

        assert_eq!(found.statistics.background, 0.0);
        assert_eq!(found.candidate_count, 1);
        assert_eq!(found.results.len(), 1);
        let peak = &found.results[0];
        assert_eq!((peak.x, peak.y), (2, 2));
        assert_eq!(peak.count, 25);
        assert_eq!(peak.max_value, -2.0);
    }

    #[test]
    fn test_nothing_above_background() {
        let data = vec![3u16; 9];
        let image = FociImage::new(&data, ImageDims::from_width_height(3, 3)).unwrap();
        let options = FindFociProcessorOptions {
            background_method: BackgroundMethod::Absolute,
            background_parameter: 10.0,
            ..plain_options()
        };
        let found = FindFociProcessor::new(options)
            .exec(&image, None, &FindFociOptions::default())
            .unwrap();
        assert!(found.is_empty());
        assert_eq!(found.candidate_count, 0);
        assert_eq!(found.statistics.background, 10.0);
        assert_eq!(found.statistics.region_maximum, 3.0);
    }

    #[test]
    fn test_labels_follow_final_ids() {
        // Smaller peak on the left so ranking swaps the internal order
        let data: Vec<f32> = vec![1.0, 6.0, 2.0, 0.0, 3.0, 9.0, 3.0, 1.0];
        let image = FociImage::new(&data, ImageDims::from_width_height(8, 1)).unwrap();
        let options = FindFociProcessorOptions {
            sort_method: SortMethod::X,
            ..plain_options()
        };
        let output = FindFociOptions {
            keep_label_buffer: true,
            mask_method: MaskMethod::Peaks,
            ..Default::default()
        };
        let found = FindFociProcessor::new(options).exec(&image, None, &output).unwrap();

        assert_eq!(found.results.len(), 2);
        assert_eq!(found.results[0].x, 1);
        let labels = found.labels.unwrap();
        assert_eq!(labels.shape(), &[1, 1, 8]);
        assert_eq!(labels[[0, 0, 1]], 1);
        assert_eq!(labels[[0, 0, 5]], 2);
        assert_eq!(found.mask.unwrap(), labels);
    }
}
