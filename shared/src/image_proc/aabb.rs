//! Axis-Aligned Bounding Box for peak regions in image stacks.
//!
//! Bounds are inclusive in all three axes. An empty box starts with inverted
//! bounds and becomes valid once a point is included; merging two boxes gives
//! the smallest box containing both. Peak merging uses [`Aabb3::merge`] to absorb
//! the territory of a merged-away peak, and edge filtering uses
//! [`Aabb3::touches_xy_edge`].

use crate::image_size::ImageDims;
use serde::{Deserialize, Serialize};

/// Axis-Aligned Bounding Box in (x, y, z) pixel coordinates.
///
/// # Examples
///
/// ```rust
/// use shared::image_proc::aabb::Aabb3;
///
/// let mut bbox = Aabb3::new();
/// assert!(!bbox.is_valid());
///
/// bbox.expand_to_include(4, 5, 0);
/// bbox.expand_to_include(6, 2, 0);
/// assert_eq!(bbox.width(), 3);
/// assert_eq!(bbox.height(), 4);
/// assert!(bbox.contains_point(5, 3, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aabb3 {
    /// Minimum x coordinate (inclusive)
    pub min_x: usize,
    /// Minimum y coordinate (inclusive)
    pub min_y: usize,
    /// Minimum z coordinate (inclusive)
    pub min_z: usize,
    /// Maximum x coordinate (inclusive)
    pub max_x: usize,
    /// Maximum y coordinate (inclusive)
    pub max_y: usize,
    /// Maximum z coordinate (inclusive)
    pub max_z: usize,
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::new()
    }
}

impl Aabb3 {
    /// Create a new empty box with invalid bounds.
    ///
    /// Min coordinates start at `usize::MAX` and max coordinates at 0 so that the
    /// first call to [`Aabb3::expand_to_include`] sets both.
    pub fn new() -> Self {
        Self {
            min_x: usize::MAX,
            min_y: usize::MAX,
            min_z: usize::MAX,
            max_x: 0,
            max_y: 0,
            max_z: 0,
        }
    }

    /// Create a box containing a single point
    pub fn from_point(x: usize, y: usize, z: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            min_z: z,
            max_x: x,
            max_y: y,
            max_z: z,
        }
    }

    /// Whether at least one point has been included
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y && self.min_z <= self.max_z
    }

    /// Grow the box to include a point
    pub fn expand_to_include(&mut self, x: usize, y: usize, z: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.min_z = self.min_z.min(z);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.max_z = self.max_z.max(z);
    }

    /// Smallest box containing both boxes
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            min_z: self.min_z.min(other.min_z),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
            max_z: self.max_z.max(other.max_z),
        }
    }

    /// Whether the point lies inside the box
    pub fn contains_point(&self, x: usize, y: usize, z: usize) -> bool {
        (self.min_x..=self.max_x).contains(&x)
            && (self.min_y..=self.max_y).contains(&y)
            && (self.min_z..=self.max_z).contains(&z)
    }

    /// Whether the boxes share any pixel
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
            && self.min_z <= other.max_z
            && self.max_z >= other.min_z
    }

    /// Whether the box reaches x = 0, y = 0, x = width - 1 or y = height - 1
    pub fn touches_xy_edge(&self, dims: &ImageDims) -> bool {
        self.is_valid()
            && (self.min_x == 0
                || self.min_y == 0
                || self.max_x + 1 >= dims.width
                || self.max_y + 1 >= dims.height)
    }

    /// Width in pixels (0 if invalid)
    pub fn width(&self) -> usize {
        if self.is_valid() {
            self.max_x - self.min_x + 1
        } else {
            0
        }
    }

    /// Height in pixels (0 if invalid)
    pub fn height(&self) -> usize {
        if self.is_valid() {
            self.max_y - self.min_y + 1
        } else {
            0
        }
    }

    /// Depth in slices (0 if invalid)
    pub fn depth(&self) -> usize {
        if self.is_valid() {
            self.max_z - self.min_z + 1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_invalid() {
        let bbox = Aabb3::new();
        assert!(!bbox.is_valid());
        assert_eq!(bbox.width(), 0);
        assert!(!bbox.touches_xy_edge(&ImageDims::from_width_height(10, 10)));
    }

    #[test]
    fn test_merge() {
        let a = Aabb3::from_point(2, 3, 0);
        let b = Aabb3::from_point(7, 1, 2);
        let merged = a.merge(&b);

        assert_eq!(merged.min_x, 2);
        assert_eq!(merged.max_x, 7);
        assert_eq!(merged.min_y, 1);
        assert_eq!(merged.max_y, 3);
        assert_eq!(merged.depth(), 3);
        assert!(merged.overlaps(&a));
        assert!(merged.overlaps(&b));
    }

    #[test]
    fn test_merge_with_empty_keeps_bounds() {
        let a = Aabb3::from_point(4, 4, 0);
        assert_eq!(a.merge(&Aabb3::new()), a);
    }

    #[test]
    fn test_touches_edge() {
        let dims = ImageDims::from_width_height(10, 8);
        assert!(Aabb3::from_point(0, 4, 0).touches_xy_edge(&dims));
        assert!(Aabb3::from_point(9, 4, 0).touches_xy_edge(&dims));
        assert!(Aabb3::from_point(4, 7, 0).touches_xy_edge(&dims));
        assert!(!Aabb3::from_point(4, 4, 0).touches_xy_edge(&dims));
    }

    #[test]
    fn test_overlap() {
        let mut a = Aabb3::from_point(1, 1, 0);
        a.expand_to_include(3, 3, 0);
        let b = Aabb3::from_point(3, 3, 0);
        let c = Aabb3::from_point(5, 5, 0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
