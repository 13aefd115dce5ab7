//! Output masks built from the final label buffer.

use shared::ImageDims;

use crate::options::MaskMethod;
use crate::result::FindFociResult;

/// Label written at each result maximum when maxima are marked
pub const MAXIMA_MARKER: u32 = u32::MAX;

/// Inputs shared by every mask method
pub(crate) struct MaskSource<'a> {
    /// Search image
    pub values: &'a [f32],
    /// Final ranked peak id per pixel
    pub labels: &'a [u32],
    /// Ranked results, `results[k].id == k + 1`
    pub results: &'a [FindFociResult],
    pub dims: ImageDims,
    pub background: f64,
    pub fraction: f64,
}

impl MaskSource<'_> {
    fn result(&self, id: u32) -> &FindFociResult {
        &self.results[id as usize - 1]
    }

    /// Pixel lists per final id, indexed by `id - 1`
    fn pixels_by_peak(&self) -> Vec<Vec<usize>> {
        let mut pixels = vec![Vec::new(); self.results.len()];
        for (index, &id) in self.labels.iter().enumerate() {
            if id != 0 {
                pixels[id as usize - 1].push(index);
            }
        }
        pixels
    }

    fn above_saddle(&self, binary: bool) -> Vec<u32> {
        self.labels
            .iter()
            .zip(self.values)
            .map(|(&id, &v)| {
                if id != 0 && v as f64 > self.result(id).highest_saddle_value {
                    if binary {
                        1
                    } else {
                        id
                    }
                } else {
                    0
                }
            })
            .collect()
    }

    /// Brightest pixels of each peak until the cumulative intensity above
    /// background reaches the fraction of the peak total
    fn fraction_of_intensity(&self) -> Vec<u32> {
        let mut mask = vec![0u32; self.labels.len()];
        for (slot, mut pixels) in self.pixels_by_peak().into_iter().enumerate() {
            let weight = |p: usize| (self.values[p] as f64 - self.background).max(0.0);
            let target = self.fraction * pixels.iter().map(|&p| weight(p)).sum::<f64>();
            pixels.sort_by(|&a, &b| self.values[b].total_cmp(&self.values[a]).then(a.cmp(&b)));

            let mut cumulative = 0.0;
            for p in pixels {
                mask[p] = slot as u32 + 1;
                cumulative += weight(p);
                if cumulative >= target {
                    break;
                }
            }
        }
        mask
    }

    fn fraction_of_height(&self) -> Vec<u32> {
        self.labels
            .iter()
            .zip(self.values)
            .map(|(&id, &v)| {
                if id == 0 {
                    return 0;
                }
                let max = self.result(id).max_value;
                let floor = max - self.fraction * (max - self.background);
                if v as f64 >= floor {
                    id
                } else {
                    0
                }
            })
            .collect()
    }
}

/// Build an output mask.
///
/// # Arguments
/// * `method` - Mask method; `None` produces no mask
/// * `source` - Search image, labels and results
/// * `mark_maxima` - Write [`MAXIMA_MARKER`] at each result maximum
///
/// # Returns
/// Linear mask buffer, or `None` for [`MaskMethod::None`]
pub(crate) fn build_mask(method: MaskMethod, source: &MaskSource, mark_maxima: bool) -> Option<Vec<u32>> {
    let mut mask = match method {
        MaskMethod::None => return None,
        MaskMethod::Peaks => source.labels.to_vec(),
        MaskMethod::Threshold => source.labels.iter().map(|&id| u32::from(id != 0)).collect(),
        MaskMethod::PeaksAboveSaddle => source.above_saddle(false),
        MaskMethod::ThresholdedPeaksAboveSaddle => source.above_saddle(true),
        MaskMethod::FractionOfIntensity => source.fraction_of_intensity(),
        MaskMethod::FractionOfHeight => source.fraction_of_height(),
    };

    if mark_maxima {
        for result in source.results {
            mask[source.dims.index(result.x, result.y, result.z)] = MAXIMA_MARKER;
        }
    }
    Some(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::MaskState;
    use shared::image_proc::Aabb3;

    fn result(id: u32, x: usize, max_value: f64, saddle: f64) -> FindFociResult {
        FindFociResult {
            id,
            x,
            y: 0,
            z: 0,
            centre: [x as f64, 0.0, 0.0],
            count: 0,
            total_intensity: 0.0,
            average_intensity: 0.0,
            max_value,
            highest_saddle_value: saddle,
            saddle_neighbour_id: 0,
            count_above_saddle: 0,
            intensity_above_saddle: 0.0,
            total_intensity_above_background: 0.0,
            average_intensity_above_background: 0.0,
            intensity_above_minimum: 0.0,
            bounds: Aabb3::new(),
            sort_value: 0.0,
            object_id: 0,
            mask_state: MaskState::NoMask,
        }
    }

    struct Fixture {
        values: Vec<f32>,
        labels: Vec<u32>,
        results: Vec<FindFociResult>,
    }

    fn fixture() -> Fixture {
        Fixture {
            values: vec![1.0, 9.0, 6.0, 4.0, 5.0, 7.0, 2.0],
            labels: vec![1, 1, 1, 1, 2, 2, 2],
            results: vec![result(1, 1, 9.0, 4.0), result(2, 5, 7.0, 4.0)],
        }
    }

    fn build(f: &Fixture, method: MaskMethod, fraction: f64, mark: bool) -> Option<Vec<u32>> {
        let source = MaskSource {
            values: &f.values,
            labels: &f.labels,
            results: &f.results,
            dims: ImageDims::from_width_height(7, 1),
            background: 0.0,
            fraction,
        };
        build_mask(method, &source, mark)
    }

    #[test]
    fn test_label_masks() {
        let f = fixture();
        assert_eq!(build(&f, MaskMethod::None, 0.5, true), None);
        assert_eq!(build(&f, MaskMethod::Peaks, 0.5, false), Some(f.labels.clone()));
        assert_eq!(
            build(&f, MaskMethod::Threshold, 0.5, false),
            Some(vec![1; 7])
        );
    }

    #[test]
    fn test_above_saddle_masks() {
        let f = fixture();
        assert_eq!(
            build(&f, MaskMethod::PeaksAboveSaddle, 0.5, false),
            Some(vec![0, 1, 1, 0, 2, 2, 0])
        );
        assert_eq!(
            build(&f, MaskMethod::ThresholdedPeaksAboveSaddle, 0.5, false),
            Some(vec![0, 1, 1, 0, 1, 1, 0])
        );
    }

    #[test]
    fn test_fraction_masks() {
        let f = fixture();
        // Peak 1 needs 9 + 6 to reach half of 20; peak 2 reaches half of 14 with 7
        assert_eq!(
            build(&f, MaskMethod::FractionOfIntensity, 0.5, false),
            Some(vec![0, 1, 1, 0, 0, 2, 0])
        );
        // Floors: peak 1 at 4.5, peak 2 at 3.5
        assert_eq!(
            build(&f, MaskMethod::FractionOfHeight, 0.5, false),
            Some(vec![0, 1, 1, 0, 2, 2, 0])
        );
    }

    #[test]
    fn test_marking_maxima() {
        let f = fixture();
        let mask = build(&f, MaskMethod::Threshold, 0.5, true).unwrap();
        assert_eq!(mask[1], MAXIMA_MARKER);
        assert_eq!(mask[5], MAXIMA_MARKER);
        assert_eq!(mask[0], 1);
    }
}
