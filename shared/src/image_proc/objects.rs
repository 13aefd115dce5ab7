//! Connected-component analysis of labelled masks.
//!
//! A mask is a `u32` buffer where zero is background and each non-zero value
//! names a region. Touching pixels that carry the *same* non-zero value are
//! joined into one object; touching pixels with different values stay separate.
//! Objects are numbered 1..=n in the scan order of their first pixel.
//!
//! The two-pass labelling with a union-find equivalence table resolves all
//! merges in one sweep. Roots are always the smallest provisional label, which
//! makes the final numbering follow scan order.

use crate::image_proc::neighbourhood::{Connectivity, Neighbourhood};
use crate::image_size::ImageDims;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObjectError {
    #[error("Mask has {actual} pixels but the image has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Find the root label with path halving.
fn find_root(parents: &mut [usize], label: usize) -> usize {
    let mut current = label;
    while current != parents[current] {
        parents[current] = parents[parents[current]];
        current = parents[current];
    }
    current
}

/// Union two labels, keeping the smaller root.
fn union_labels(parents: &mut [usize], a: usize, b: usize) {
    let root_a = find_root(parents, a);
    let root_b = find_root(parents, b);
    if root_a < root_b {
        parents[root_b] = root_a;
    } else if root_b < root_a {
        parents[root_a] = root_b;
    }
}

/// Labelled objects of a mask with per-object size and centroid.
#[derive(Debug, Clone)]
pub struct ObjectAnalyzer {
    dims: ImageDims,
    connectivity: Connectivity,
    labels: Vec<u32>,
    sizes: Vec<usize>,
    sums: Vec<[f64; 3]>,
}

impl ObjectAnalyzer {
    /// Label the objects of a mask.
    ///
    /// # Arguments
    /// * `mask` - Linear x-fastest mask buffer (0 = background)
    /// * `dims` - Image dimensions
    /// * `connectivity` - `Four` (6 in 3D) or `Eight` (26 in 3D)
    ///
    /// # Errors
    /// `DimensionMismatch` if the buffer length differs from `dims.pixel_count()`
    pub fn new(
        mask: &[u32],
        dims: ImageDims,
        connectivity: Connectivity,
    ) -> Result<Self, ObjectError> {
        if mask.len() != dims.pixel_count() {
            return Err(ObjectError::DimensionMismatch {
                expected: dims.pixel_count(),
                actual: mask.len(),
            });
        }

        let hood = Neighbourhood::with_connectivity(dims, connectivity);
        let mut provisional = vec![0usize; mask.len()];
        let mut parents = vec![0usize];

        // First pass: provisional labels, joined through already visited neighbours
        for index in 0..mask.len() {
            let value = mask[index];
            if value == 0 {
                continue;
            }
            let mut label = 0usize;
            for (_, n) in hood.neighbours(index) {
                if n >= index || mask[n] != value {
                    continue;
                }
                let other = provisional[n];
                if label == 0 {
                    label = other;
                } else if other != label {
                    union_labels(&mut parents, label, other);
                }
            }
            if label == 0 {
                label = parents.len();
                parents.push(label);
            }
            provisional[index] = label;
        }

        // Resolve roots into consecutive ids in scan order
        let mut relabel = vec![0u32; parents.len()];
        let mut next = 0u32;
        for label in 1..parents.len() {
            let root = find_root(&mut parents, label);
            if relabel[root] == 0 {
                next += 1;
                relabel[root] = next;
            }
            relabel[label] = relabel[root];
        }

        let object_count = next as usize;
        let mut sizes = vec![0usize; object_count + 1];
        let mut sums = vec![[0.0f64; 3]; object_count + 1];
        let labels: Vec<u32> = provisional
            .iter()
            .enumerate()
            .map(|(index, &label)| {
                let id = relabel[label];
                if id != 0 {
                    let (x, y, z) = dims.coords(index);
                    sizes[id as usize] += 1;
                    let sum = &mut sums[id as usize];
                    sum[0] += x as f64;
                    sum[1] += y as f64;
                    sum[2] += z as f64;
                }
                id
            })
            .collect();

        log::debug!("Found {object_count} objects in {dims} mask ({connectivity:?})");

        Ok(Self {
            dims,
            connectivity,
            labels,
            sizes,
            sums,
        })
    }

    /// Dimensions of the analysed mask
    pub fn dims(&self) -> &ImageDims {
        &self.dims
    }

    /// Connectivity used for labelling
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Object label per pixel (0 = background)
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Consume the analyser, returning the label buffer
    pub fn into_labels(self) -> Vec<u32> {
        self.labels
    }

    /// Number of objects found
    pub fn object_count(&self) -> usize {
        self.sizes.len() - 1
    }

    /// Object at a linear index (0 = background)
    pub fn object_at(&self, index: usize) -> u32 {
        self.labels.get(index).copied().unwrap_or(0)
    }

    /// Pixel count of an object
    pub fn size(&self, object_id: u32) -> Option<usize> {
        match object_id as usize {
            0 => None,
            id => self.sizes.get(id).copied(),
        }
    }

    /// Mean (x, y, z) of an object's pixels
    pub fn centroid(&self, object_id: u32) -> Option<[f64; 3]> {
        let size = self.size(object_id)? as f64;
        let sum = self.sums[object_id as usize];
        Some([sum[0] / size, sum[1] / size, sum[2] / size])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mask_from_rows(rows: &[&[u32]]) -> (Vec<u32>, ImageDims) {
        let dims = ImageDims::from_width_height(rows[0].len(), rows.len());
        (rows.iter().flat_map(|r| r.iter().copied()).collect(), dims)
    }

    #[test]
    fn test_empty_mask() {
        let (mask, dims) = mask_from_rows(&[&[0, 0], &[0, 0]]);
        let objects = ObjectAnalyzer::new(&mask, dims, Connectivity::Eight).unwrap();
        assert_eq!(objects.object_count(), 0);
        assert!(objects.labels().iter().all(|&l| l == 0));
        assert_eq!(objects.size(1), None);
    }

    #[test]
    fn test_diagonal_connectivity() {
        let (mask, dims) = mask_from_rows(&[&[1, 0, 0], &[0, 1, 0], &[0, 0, 1]]);

        let eight = ObjectAnalyzer::new(&mask, dims, Connectivity::Eight).unwrap();
        assert_eq!(eight.object_count(), 1);
        assert_eq!(eight.size(1), Some(3));

        let four = ObjectAnalyzer::new(&mask, dims, Connectivity::Four).unwrap();
        assert_eq!(four.object_count(), 3);
        assert_eq!(four.labels(), &[1, 0, 0, 0, 2, 0, 0, 0, 3]);
    }

    #[test]
    fn test_u_shape_resolves_equivalence() {
        let (mask, dims) = mask_from_rows(&[&[1, 0, 1], &[1, 0, 1], &[1, 1, 1]]);
        let objects = ObjectAnalyzer::new(&mask, dims, Connectivity::Four).unwrap();
        assert_eq!(objects.object_count(), 1);
        assert_eq!(objects.size(1), Some(7));
    }

    #[test]
    fn test_different_values_stay_separate() {
        let (mask, dims) = mask_from_rows(&[&[2, 2, 5, 5], &[2, 2, 5, 5]]);
        let objects = ObjectAnalyzer::new(&mask, dims, Connectivity::Eight).unwrap();
        assert_eq!(objects.object_count(), 2);
        assert_eq!(objects.object_at(0), 1);
        assert_eq!(objects.object_at(3), 2);
        let centroid = objects.centroid(2).unwrap();
        assert_relative_eq!(centroid[0], 2.5);
        assert_relative_eq!(centroid[1], 0.5);
    }

    #[test]
    fn test_scan_order_numbering() {
        let (mask, dims) = mask_from_rows(&[&[0, 0, 0, 3], &[4, 0, 0, 3], &[4, 0, 0, 0]]);
        let objects = ObjectAnalyzer::new(&mask, dims, Connectivity::Eight).unwrap();
        assert_eq!(objects.object_at(3), 1);
        assert_eq!(objects.object_at(4), 2);
    }

    #[test]
    fn test_3d_objects() {
        let dims = ImageDims::new(2, 2, 3);
        let mut mask = vec![0u32; dims.pixel_count()];
        mask[dims.index(0, 0, 0)] = 1;
        mask[dims.index(0, 0, 1)] = 1;
        mask[dims.index(1, 1, 2)] = 1;

        let six = ObjectAnalyzer::new(&mask, dims, Connectivity::Four).unwrap();
        assert_eq!(six.object_count(), 2);
        assert_eq!(six.size(1), Some(2));

        let full = ObjectAnalyzer::new(&mask, dims, Connectivity::Eight).unwrap();
        assert_eq!(full.object_count(), 1);
        assert_relative_eq!(full.centroid(1).unwrap()[2], 1.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let dims = ImageDims::from_width_height(3, 3);
        assert_eq!(
            ObjectAnalyzer::new(&[0u32; 4], dims, Connectivity::Four).unwrap_err(),
            ObjectError::DimensionMismatch {
                expected: 9,
                actual: 4
            }
        );
    }
}
