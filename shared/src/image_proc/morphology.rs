//! Erosion and expansion of label images.
//!
//! Both operations use the full neighbourhood (8 in 2D, 26 in 3D) and read from
//! a snapshot of the previous iteration, so the result does not depend on scan
//! order. Pixels outside the image never influence a decision.

use crate::image_proc::neighbourhood::Neighbourhood;
use crate::image_size::ImageDims;

/// Shrink labelled regions by removing their boundary pixels.
///
/// A labelled pixel is cleared when any in-bounds neighbour carries a different
/// label (including background).
///
/// # Arguments
/// * `labels` - Linear x-fastest label buffer, modified in place
/// * `dims` - Image dimensions
/// * `iterations` - Number of erosion steps
///
/// # Returns
/// Number of pixels cleared
pub fn erode_labels(labels: &mut [u32], dims: &ImageDims, iterations: usize) -> usize {
    let hood = Neighbourhood::full(*dims);
    let mut cleared = 0;

    for _ in 0..iterations {
        let snapshot = labels.to_vec();
        let mut changed = 0;
        for (index, label) in labels.iter_mut().enumerate() {
            let current = snapshot[index];
            if current == 0 {
                continue;
            }
            if hood.neighbours(index).any(|(_, n)| snapshot[n] != current) {
                *label = 0;
                changed += 1;
            }
        }
        cleared += changed;
        if changed == 0 {
            break;
        }
    }
    cleared
}

/// Grow labelled regions into unlabelled pixels.
///
/// An unlabelled pixel takes a label when all of its labelled neighbours share
/// that one label; pixels touched by two or more labels stay unlabelled so
/// regions never merge.
///
/// # Returns
/// Number of pixels labelled
pub fn expand_labels(labels: &mut [u32], dims: &ImageDims, iterations: usize) -> usize {
    let hood = Neighbourhood::full(*dims);
    let mut grown = 0;

    for _ in 0..iterations {
        let snapshot = labels.to_vec();
        let mut changed = 0;
        for (index, label) in labels.iter_mut().enumerate() {
            if snapshot[index] != 0 {
                continue;
            }
            let mut candidate = 0u32;
            let mut conflict = false;
            for (_, n) in hood.neighbours(index) {
                let other = snapshot[n];
                if other == 0 || other == candidate {
                    continue;
                }
                if candidate == 0 {
                    candidate = other;
                } else {
                    conflict = true;
                    break;
                }
            }
            if candidate != 0 && !conflict {
                *label = candidate;
                changed += 1;
            }
        }
        grown += changed;
        if changed == 0 {
            break;
        }
    }
    grown
}
