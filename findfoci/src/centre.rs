//! Centre refinement for surviving peaks.
//!
//! Three families are supported, each measured on either the search image
//! (after any pre-blur) or the original input:
//!
//! - **Max value**: the pixel holding the maximum.
//! - **Centre of mass**: intensity-above-background weighted mean position of
//!   the peak's pixels inside a cube around the maximum.
//! - **Gaussian**: a 1D fit along each axis through the maximum, delegated to a
//!   [`GaussianFitter`]. Any failed axis falls back to the max value centre.

use nalgebra::{DMatrix, DVector};
use shared::ImageDims;

use crate::growth::PeakRegion;
use crate::options::CentreMethod;

/// Strategy for sub-pixel peak location along one axis.
pub trait GaussianFitter: Send + Sync {
    /// Fit a peak to a profile of background-subtracted samples.
    ///
    /// # Arguments
    /// * `samples` - Profile values; zero marks samples outside the peak
    /// * `centre` - Index of the maximum within `samples`
    ///
    /// # Returns
    /// Offset of the fitted peak from `centre`, or `None` if the fit failed
    fn fit_offset(&self, samples: &[f64], centre: usize) -> Option<f64>;
}

/// Gaussian fit by least squares on the log of the profile.
///
/// The log of a Gaussian is a parabola, so a quadratic fitted to
/// `(x, ln y)` gives the peak position at its vertex. Only positive samples
/// are used and at least three are required.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogParabolaFitter;

impl GaussianFitter for LogParabolaFitter {
    fn fit_offset(&self, samples: &[f64], centre: usize) -> Option<f64> {
        let points: Vec<(f64, f64)> = samples
            .iter()
            .enumerate()
            .filter(|(_, &y)| y > 0.0 && y.is_finite())
            .map(|(i, &y)| (i as f64 - centre as f64, y.ln()))
            .collect();
        if points.len() < 3 {
            return None;
        }

        // Design matrix rows are [x^2, x, 1] against ln y
        let n = points.len();
        let mut a_data = Vec::with_capacity(n * 3);
        let mut b = Vec::with_capacity(n);
        for &(x, y) in &points {
            a_data.push(x * x);
            a_data.push(x);
            a_data.push(1.0);
            b.push(y);
        }
        let a_matrix = DMatrix::from_row_slice(n, 3, &a_data);
        let b_vec = DVector::from_vec(b);

        let svd = a_matrix.svd(true, true);
        let params = svd.solve(&b_vec, 1e-10).ok()?;
        let (a, b) = (params[0], params[1]);
        if a >= 0.0 {
            return None;
        }

        let offset = -b / (2.0 * a);
        let reach = points.iter().fold(0.0f64, |r, &(x, _)| r.max(x.abs()));
        if offset.is_finite() && offset.abs() <= reach {
            Some(offset)
        } else {
            None
        }
    }
}

/// Everything needed to locate peak centres in one image
pub(crate) struct CentreFinder<'a> {
    pub search: &'a [f32],
    pub original: &'a [f32],
    /// Surviving peak id per pixel
    pub owners: &'a [u32],
    pub dims: ImageDims,
    pub background: f64,
    pub method: CentreMethod,
    pub parameter: f64,
    pub fitter: &'a dyn GaussianFitter,
}

impl CentreFinder<'_> {
    fn image(&self) -> &[f32] {
        if self.method.uses_original() {
            self.original
        } else {
            self.search
        }
    }

    /// Pixel holding the maximum on the measured image (lowest index on ties)
    fn max_pixel(&self, region: &PeakRegion) -> usize {
        if !self.method.uses_original() {
            return region.max_index;
        }
        let image = self.original;
        region
            .pixels
            .iter()
            .copied()
            .fold(None, |best: Option<usize>, p| match best {
                Some(b) if image[b] > image[p] || (image[b] == image[p] && b < p) => Some(b),
                _ => Some(p),
            })
            .unwrap_or(region.max_index)
    }

    fn coords_of(&self, index: usize) -> [f64; 3] {
        let (x, y, z) = self.dims.coords(index);
        [x as f64, y as f64, z as f64]
    }

    /// Refined (x, y, z) centre of a peak
    pub fn centre(&self, region: &PeakRegion) -> [f64; 3] {
        let max_pixel = self.max_pixel(region);
        match self.method {
            CentreMethod::MaxValueSearch | CentreMethod::MaxValueOriginal => {
                self.coords_of(max_pixel)
            }
            CentreMethod::CentreOfMassSearch | CentreMethod::CentreOfMassOriginal => self
                .centre_of_mass(region, max_pixel)
                .unwrap_or_else(|| self.coords_of(max_pixel)),
            CentreMethod::GaussianSearch | CentreMethod::GaussianOriginal => self
                .gaussian(region, max_pixel)
                .unwrap_or_else(|| {
                    log::trace!("Gaussian fit failed for peak {}, using maximum", region.id);
                    self.coords_of(max_pixel)
                }),
        }
    }

    fn centre_of_mass(&self, region: &PeakRegion, max_pixel: usize) -> Option<[f64; 3]> {
        let image = self.image();
        let radius = self.parameter.round() as usize;
        let (cx, cy, cz) = self.dims.coords(max_pixel);

        let mut sum = [0.0f64; 3];
        let mut weight = 0.0;
        for &p in &region.pixels {
            let (x, y, z) = self.dims.coords(p);
            if radius > 0
                && (x.abs_diff(cx) > radius || y.abs_diff(cy) > radius || z.abs_diff(cz) > radius)
            {
                continue;
            }
            let w = (image[p] as f64 - self.background).max(0.0);
            sum[0] += w * x as f64;
            sum[1] += w * y as f64;
            sum[2] += w * z as f64;
            weight += w;
        }

        if weight > 0.0 {
            Some([sum[0] / weight, sum[1] / weight, sum[2] / weight])
        } else {
            None
        }
    }

    fn gaussian(&self, region: &PeakRegion, max_pixel: usize) -> Option<[f64; 3]> {
        let image = self.image();
        let extent = self.dims.width.max(self.dims.height).max(self.dims.depth) as f64;
        let window = self.parameter.round().clamp(1.0, extent.max(1.0)) as isize;
        let (cx, cy, cz) = self.dims.coords(max_pixel);
        let origin = [cx as isize, cy as isize, cz as isize];
        let axes = if self.dims.is_3d() { 3 } else { 2 };

        let mut centre = [cx as f64, cy as f64, cz as f64];
        for (axis, coordinate) in centre.iter_mut().enumerate().take(axes) {
            let samples: Vec<f64> = (-window..=window)
                .map(|offset| {
                    let mut at = origin;
                    at[axis] += offset;
                    if !self.dims.contains(at[0], at[1], at[2]) {
                        return 0.0;
                    }
                    let index = self.dims.index(at[0] as usize, at[1] as usize, at[2] as usize);
                    if self.owners[index] != region.id {
                        return 0.0;
                    }
                    (image[index] as f64 - self.background).max(0.0)
                })
                .collect();
            *coordinate += self.fitter.fit_offset(&samples, window as usize)?;
        }
        Some(centre)
    }
}
