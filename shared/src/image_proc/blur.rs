//! Separable Gaussian blur for image stacks.
//!
//! Each z slice is blurred independently with a 1D kernel applied along x then
//! y. Slices are processed in parallel with rayon; every slice is written by
//! exactly one task so the output does not depend on scheduling. Edges are
//! handled by extending the border pixel outward.

use crate::image_size::ImageDims;
use rayon::prelude::*;

/// Kernel half-width in units of sigma
const KERNEL_EXTENT_SIGMAS: f64 = 4.0;

/// Create a normalised 1D Gaussian kernel.
///
/// # Arguments
/// * `sigma` - Standard deviation in pixels (must be > 0)
/// * `max_radius` - Upper bound on the kernel radius
///
/// # Returns
/// Odd-length kernel of radius `ceil(4 * sigma)`, at most `max_radius`, summing to 1
pub fn gaussian_kernel_1d(sigma: f64, max_radius: usize) -> Vec<f64> {
    let limit = max_radius.max(1) as f64;
    let radius = (KERNEL_EXTENT_SIGMAS * sigma).ceil().clamp(1.0, limit) as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();

    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Convolve a line with the kernel, extending edge samples.
fn convolve_line(input: &[f32], output: &mut [f32], kernel: &[f64]) {
    let radius = (kernel.len() / 2) as isize;
    let last = input.len() as isize - 1;
    for (i, out) in output.iter_mut().enumerate() {
        let mut acc = 0.0f64;
        for (k, weight) in kernel.iter().enumerate() {
            let src = (i as isize + k as isize - radius).clamp(0, last) as usize;
            acc += weight * input[src] as f64;
        }
        *out = acc as f32;
    }
}

fn blur_slice(slice: &mut [f32], width: usize, height: usize, kernel: &[f64]) {
    let mut line = vec![0.0f32; width.max(height)];

    // Rows
    for row in slice.chunks_exact_mut(width) {
        line[..width].copy_from_slice(row);
        convolve_line(&line[..width], row, kernel);
    }

    // Columns
    let mut column = vec![0.0f32; height];
    for x in 0..width {
        for y in 0..height {
            line[y] = slice[y * width + x];
        }
        convolve_line(&line[..height], &mut column, kernel);
        for y in 0..height {
            slice[y * width + x] = column[y];
        }
    }
}

/// Blur a linear x-fastest buffer in place, slice by slice.
///
/// A non-positive sigma leaves the data untouched.
///
/// # Arguments
/// * `data` - Pixel buffer of `dims.pixel_count()` samples
/// * `dims` - Image dimensions
/// * `sigma` - Gaussian standard deviation in pixels
pub fn gaussian_blur_slices(data: &mut [f32], dims: &ImageDims, sigma: f64) {
    if sigma.is_nan() || sigma <= 0.0 || dims.is_empty() {
        return;
    }
    // Taps beyond the longest line only repeat the clamped edge sample
    let kernel = gaussian_kernel_1d(sigma, dims.width.max(dims.height));
    log::debug!(
        "Gaussian blur sigma={sigma} (kernel {} taps) over {dims}",
        kernel.len()
    );

    let (width, height) = (dims.width, dims.height);
    data.par_chunks_exact_mut(dims.slice_size())
        .for_each(|slice| blur_slice(slice, width, height, &kernel));
}
