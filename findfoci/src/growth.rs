//! Region growing from candidate maxima.
//!
//! Growth runs in two passes. The direction pass stores, for every
//! non-maximum pixel, which neighbour is its steepest ascent. The growth pass
//! then floods downhill from each candidate in rank order: a pixel joins a peak
//! only through the neighbour it points at, or, when it has no higher
//! neighbour at all, through an equal-valued neighbour. Each pixel therefore
//! ends up in the basin it would reach by climbing, and the first peak to claim
//! a pixel keeps it.

use std::collections::VecDeque;

use shared::image_proc::{Aabb3, Neighbourhood};

use crate::error::{FindFociError, Result};
use crate::maxima::Maximum;
use crate::options::SearchMethod;
use crate::statistics::search_threshold;
use crate::types::{PixelTypes, EXCLUDED, MAXIMUM, NO_DIRECTION};

/// Cooperative cancellation hook polled between peaks.
pub trait Cancellation {
    fn is_cancelled(&self) -> bool;
}

impl<F: Fn() -> bool> Cancellation for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Cancellation that never fires
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl Cancellation for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Territory and running totals of one peak.
#[derive(Debug, Clone)]
pub(crate) struct PeakRegion {
    pub id: u32,
    /// Value of the maximum
    pub max_value: f64,
    /// Representative pixel of the maximum
    pub max_index: usize,
    pub count: usize,
    pub total: f64,
    pub total_above_background: f64,
    pub bounds: Aabb3,
    pub pixels: Vec<usize>,
}

impl PeakRegion {
    fn new(maximum: &Maximum) -> Self {
        Self {
            id: maximum.candidate.id,
            max_value: maximum.candidate.value as f64,
            max_index: maximum.candidate.index,
            count: 0,
            total: 0.0,
            total_above_background: 0.0,
            bounds: Aabb3::new(),
            pixels: Vec::new(),
        }
    }

    fn claim(&mut self, index: usize, value: f64, background: f64, coords: (usize, usize, usize)) {
        self.count += 1;
        self.total += value;
        self.total_above_background += value - background;
        self.bounds.expand_to_include(coords.0, coords.1, coords.2);
        self.pixels.push(index);
    }

    /// Absorb another region's territory and totals
    pub fn absorb(&mut self, other: &mut PeakRegion) {
        self.count += other.count;
        self.total += other.total;
        self.total_above_background += other.total_above_background;
        self.bounds = self.bounds.merge(&other.bounds);
        self.pixels.append(&mut other.pixels);
        other.count = 0;
    }
}

/// Store the steepest-ascent direction of every non-maximum pixel.
///
/// Only strictly higher, non-excluded neighbours count; ties go to the first
/// direction in neighbourhood order. Maxima, excluded pixels and pixels with no
/// higher neighbour get [`NO_DIRECTION`].
pub(crate) fn steepest_ascent(values: &[f32], types: &PixelTypes, hood: &Neighbourhood) -> Vec<u8> {
    let mut directions = vec![NO_DIRECTION; values.len()];
    for (index, direction) in directions.iter_mut().enumerate() {
        if types.has(index, EXCLUDED | MAXIMUM) {
            continue;
        }
        let mut best = values[index];
        for (d, n) in hood.neighbours(index) {
            if !types.has(n, EXCLUDED) && values[n] > best {
                best = values[n];
                *direction = d as u8;
            }
        }
    }
    directions
}

/// Growth parameters shared by every peak
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowthLevels {
    pub background: f64,
    /// Level the search threshold is measured from
    pub search_background: f64,
    pub search_method: SearchMethod,
    pub search_parameter: f64,
}

/// Grow every candidate in rank order.
///
/// # Returns
/// Per-pixel peak id (0 = unassigned) and one region per candidate, where
/// `regions[k]` has id `k + 1`.
///
/// # Errors
/// `Cancelled` if the cancellation hook fires between two peaks.
pub(crate) fn grow_regions(
    values: &[f32],
    types: &PixelTypes,
    directions: &[u8],
    hood: &Neighbourhood,
    maxima: &[Maximum],
    levels: GrowthLevels,
    cancel: &dyn Cancellation,
) -> Result<(Vec<u32>, Vec<PeakRegion>)> {
    let dims = *hood.dims();
    let mut assigned = vec![0u32; values.len()];
    let mut regions = Vec::with_capacity(maxima.len());
    let mut queue = VecDeque::new();

    for maximum in maxima {
        if cancel.is_cancelled() {
            log::info!("Cancelled during growth after {} peaks", regions.len());
            return Err(FindFociError::Cancelled);
        }

        let id = maximum.candidate.id;
        let mut region = PeakRegion::new(maximum);
        let floor = search_threshold(
            levels.search_method,
            levels.search_parameter,
            levels.search_background,
            region.max_value,
        );

        for &p in &maximum.pixels {
            assigned[p] = id;
            region.claim(p, values[p] as f64, levels.background, dims.coords(p));
            queue.push_back(p);
        }

        while let Some(p) = queue.pop_front() {
            let vp = values[p];
            for (_, n) in hood.neighbours(p) {
                if assigned[n] != 0 || types.has(n, EXCLUDED | MAXIMUM) {
                    continue;
                }
                let vn = values[n];
                if (vn as f64) < floor || vn > vp {
                    continue;
                }
                let direction = directions[n];
                let reaches = if direction == NO_DIRECTION {
                    vn == vp
                } else {
                    hood.neighbour(n, direction as usize) == Some(p)
                };
                if reaches {
                    assigned[n] = id;
                    region.claim(n, vn as f64, levels.background, dims.coords(n));
                    queue.push_back(n);
                }
            }
        }

        regions.push(region);
    }

    let claimed = assigned.iter().filter(|&&a| a != 0).count();
    log::debug!(
        "Grew {} regions covering {claimed} of {} pixels",
        regions.len(),
        values.len()
    );
    Ok((assigned, regions))
}
