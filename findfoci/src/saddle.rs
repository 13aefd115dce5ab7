//! Saddle detection between touching peaks.
//!
//! Every pair of touching pixels owned by different peaks offers the lower of
//! their two values as a saddle for that pair of peaks. The highest offer per
//! pair is kept, so the saddle between A and B is the same value seen from
//! either side.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shared::image_proc::Neighbourhood;

use crate::types::{PixelTypes, SADDLE, SADDLE_POINT};

/// Highest connection from one peak to a neighbouring peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FindFociSaddle {
    /// Neighbouring peak id
    pub id: u32,
    /// Saddle value
    pub value: f64,
}

impl FindFociSaddle {
    pub fn new(id: u32, value: f64) -> Self {
        Self { id, value }
    }

    /// Ordering used for saddle lists: value descending, then id ascending.
    pub fn compare(&self, other: &Self) -> Ordering {
        other
            .value
            .total_cmp(&self.value)
            .then(self.id.cmp(&other.id))
    }
}

/// Sort a saddle list into canonical order
pub(crate) fn sort_saddles(saddles: &mut [FindFociSaddle]) {
    saddles.sort_by(|a, b| a.compare(b));
}

/// Find the highest saddle between every pair of touching peaks.
///
/// # Arguments
/// * `values` - Working image
/// * `assigned` - Peak id per pixel (0 = none)
/// * `types` - Flags; contact pixels get `SADDLE`, realising pixels `SADDLE_POINT`
/// * `peak_count` - Number of peaks (ids are `1..=peak_count`)
///
/// # Returns
/// Saddle list per peak, indexed by `id - 1`, each in canonical order
pub(crate) fn find_saddles(
    values: &[f32],
    assigned: &[u32],
    types: &mut PixelTypes,
    hood: &Neighbourhood,
    peak_count: usize,
) -> Vec<Vec<FindFociSaddle>> {
    // (low id, high id) -> (saddle value, realising pixel)
    let mut best: HashMap<(u32, u32), (f32, usize)> = HashMap::new();

    for p in 0..assigned.len() {
        let a = assigned[p];
        if a == 0 {
            continue;
        }
        for (_, n) in hood.neighbours(p) {
            if n <= p {
                continue;
            }
            let b = assigned[n];
            if b == 0 || b == a {
                continue;
            }
            types.set(p, SADDLE);
            types.set(n, SADDLE);

            let (value, pixel) = if values[n] < values[p] {
                (values[n], n)
            } else {
                (values[p], p)
            };
            let key = (a.min(b), a.max(b));
            best.entry(key)
                .and_modify(|entry| {
                    if value > entry.0 {
                        *entry = (value, pixel);
                    }
                })
                .or_insert((value, pixel));
        }
    }

    let mut saddles = vec![Vec::new(); peak_count];
    for (&(a, b), &(value, pixel)) in &best {
        types.set(pixel, SADDLE_POINT);
        saddles[a as usize - 1].push(FindFociSaddle::new(b, value as f64));
        saddles[b as usize - 1].push(FindFociSaddle::new(a, value as f64));
    }
    for list in saddles.iter_mut() {
        sort_saddles(list);
    }

    log::debug!("Found {} saddles between {peak_count} peaks", best.len());
    saddles
}
