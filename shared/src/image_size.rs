//! Image dimensions and linear indexing utilities

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image dimensions structure
///
/// Represents the width, height and depth (number of z slices) of an image stack.
/// Pixels are stored in a single linear buffer in x-fastest order:
/// `index = z * width * height + y * width + x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDims {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
    /// Number of z slices (1 for a 2D image)
    pub depth: usize,
}

impl ImageDims {
    /// Create dimensions for a 2D image
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create dimensions for a 3D image stack
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Create an empty array with this size
    ///
    /// Returns an ndarray Array3 of zeros with shape (depth, height, width),
    /// matching the linear buffer layout.
    pub fn empty_array<T>(&self) -> Array3<T>
    where
        T: Clone + num_traits::Zero,
    {
        Array3::zeros((self.depth, self.height, self.width))
    }

    /// Number of pixels in a single z slice
    pub fn slice_size(&self) -> usize {
        self.width * self.height
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// True when the stack has more than one slice
    pub fn is_3d(&self) -> bool {
        self.depth > 1
    }

    /// True if any dimension is zero
    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// Linear index of (x, y, z)
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z * self.slice_size() + y * self.width + x
    }

    /// Coordinates (x, y, z) of a linear index
    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        let slice = self.slice_size();
        let z = index / slice;
        let rem = index % slice;
        (rem % self.width, rem / self.width, z)
    }

    /// Whether signed coordinates fall inside the image
    pub fn contains(&self, x: isize, y: isize, z: isize) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && (z as usize) < self.depth
    }

    /// Whether the pixel lies on the x/y border of its slice
    pub fn is_xy_edge(&self, x: usize, y: usize) -> bool {
        x == 0 || y == 0 || x + 1 == self.width || y + 1 == self.height
    }

    /// Convert to tuple (width, height, depth)
    pub fn to_tuple(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }
}

impl From<(usize, usize)> for ImageDims {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::from_width_height(dimensions.0, dimensions.1)
    }
}

impl From<(usize, usize, usize)> for ImageDims {
    fn from(dimensions: (usize, usize, usize)) -> Self {
        Self::new(dimensions.0, dimensions.1, dimensions.2)
    }
}

impl fmt::Display for ImageDims {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_3d() {
            write!(f, "{}x{}x{}", self.width, self.height, self.depth)
        } else {
            write!(f, "{}x{}", self.width, self.height)
        }
    }
}
