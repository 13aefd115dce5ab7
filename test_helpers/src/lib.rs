//! Synthetic image builders for FindFoci tests and benchmarks.
//!
//! Every generator is deterministic: noise comes from a seeded ChaCha RNG so a
//! failing test reproduces exactly.
//!
//! # Usage
//! ```rust
//! use shared::ImageDims;
//! use test_helpers::SyntheticImage;
//!
//! let mut image = SyntheticImage::new(ImageDims::from_width_height(32, 32), 100.0);
//! image.add_gaussian_spot(10.0, 12.0, 0.0, 1.5, 400.0);
//! image.add_noise(3.0, 7);
//! let samples: Vec<u16> = image.to_u16();
//! assert_eq!(samples.len(), 32 * 32);
//! ```

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use shared::image_proc::round_half_up;
use shared::ImageDims;

/// Initialise `env_logger` for a test binary.
///
/// Safe to call from every test; only the first call installs the logger.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Float image under construction, stored x-fastest like the engine buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticImage {
    dims: ImageDims,
    data: Vec<f32>,
}

impl SyntheticImage {
    /// Create an image filled with a constant level
    pub fn new(dims: ImageDims, level: f32) -> Self {
        Self {
            dims,
            data: vec![level; dims.pixel_count()],
        }
    }

    pub fn dims(&self) -> &ImageDims {
        &self.dims
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[self.dims.index(x, y, z)]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, value: f32) {
        let index = self.dims.index(x, y, z);
        self.data[index] = value;
    }

    /// Set a rectangle in every slice to `value`, clipped to the image
    pub fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, value: f32) {
        let x_end = (x + width).min(self.dims.width);
        let y_end = (y + height).min(self.dims.height);
        for z in 0..self.dims.depth {
            for yy in y..y_end {
                for xx in x..x_end {
                    self.set(xx, yy, z, value);
                }
            }
        }
    }

    /// Add an isotropic Gaussian spot.
    ///
    /// # Arguments
    /// * `cx`, `cy`, `cz` - Spot centre in pixels
    /// * `sigma` - Standard deviation in pixels
    /// * `amplitude` - Peak height above the existing level
    pub fn add_gaussian_spot(&mut self, cx: f64, cy: f64, cz: f64, sigma: f64, amplitude: f64) {
        let two_sigma_sq = 2.0 * sigma * sigma;
        for (index, value) in self.data.iter_mut().enumerate() {
            let (x, y, z) = self.dims.coords(index);
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let dz = z as f64 - cz;
            *value += (amplitude * (-(dx * dx + dy * dy + dz * dz) / two_sigma_sq).exp()) as f32;
        }
    }

    /// Add zero-mean Gaussian noise from a seeded generator
    pub fn add_noise(&mut self, std_dev: f64, seed: u64) {
        let Ok(normal) = Normal::new(0.0, std_dev) else {
            log::warn!("Ignoring noise with invalid standard deviation {std_dev}");
            return;
        };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for value in self.data.iter_mut() {
            *value += normal.sample(&mut rng) as f32;
        }
    }

    /// Samples rounded half up and clamped into the 16-bit range
    pub fn to_u16(&self) -> Vec<u16> {
        self.data
            .iter()
            .map(|&v| round_half_up(v as f64).clamp(0.0, u16::MAX as f64) as u16)
            .collect()
    }

    /// Samples rounded half up and clamped into the 8-bit range
    pub fn to_u8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|&v| round_half_up(v as f64).clamp(0.0, u8::MAX as f64) as u8)
            .collect()
    }
}

/// Spot placed by [`spot_field`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spot {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub amplitude: f64,
}

impl Spot {
    pub fn new(x: f64, y: f64, amplitude: f64) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            amplitude,
        }
    }
}

/// Build a noisy field of Gaussian spots on a flat background.
///
/// # Arguments
/// * `dims` - Image dimensions
/// * `spots` - Spot positions and heights
/// * `sigma` - Common spot width
/// * `background` - Flat background level
/// * `noise` - Noise standard deviation (0 = none)
/// * `seed` - Noise seed
pub fn spot_field(
    dims: ImageDims,
    spots: &[Spot],
    sigma: f64,
    background: f32,
    noise: f64,
    seed: u64,
) -> SyntheticImage {
    let mut image = SyntheticImage::new(dims, background);
    for spot in spots {
        image.add_gaussian_spot(spot.x, spot.y, spot.z, sigma, spot.amplitude);
    }
    if noise > 0.0 {
        image.add_noise(noise, seed);
    }
    image
}

/// Evenly spaced grid of equal spots, useful for benchmarks
pub fn spot_grid(dims: ImageDims, spacing: usize, amplitude: f64) -> Vec<Spot> {
    let spacing = spacing.max(1);
    let mut spots = Vec::new();
    let mut y = spacing / 2;
    while y < dims.height {
        let mut x = spacing / 2;
        while x < dims.width {
            spots.push(Spot::new(x as f64, y as f64, amplitude));
            x += spacing;
        }
        y += spacing;
    }
    spots
}
