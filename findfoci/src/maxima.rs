//! Candidate maxima discovery.
//!
//! A pixel is a candidate when no non-excluded neighbour is strictly higher.
//! Equal-valued neighbours form a plateau that is flood filled as a unit: one
//! strictly higher pixel anywhere around the plateau disqualifies all of it.
//! A qualifying plateau becomes a single candidate represented by the plateau
//! pixel nearest its centroid.

use std::collections::VecDeque;

use shared::image_proc::Neighbourhood;
use shared::ImageDims;

use crate::types::{PixelTypes, EXCLUDED, LISTED, MAXIMUM, PLATEAU};

/// Local maximum found before growth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    /// Linear index of the representative pixel
    pub index: usize,
    pub value: f32,
    /// Provisional peak id (rank + 1)
    pub id: u32,
}

/// Candidate with every pixel of its plateau (ascending index order)
#[derive(Debug, Clone)]
pub(crate) struct Maximum {
    pub candidate: Candidate,
    pub pixels: Vec<usize>,
}

/// Plateau pixel nearest the centroid, lowest index on ties
fn representative(plateau: &[usize], dims: &ImageDims) -> usize {
    let n = plateau.len() as f64;
    let mut centroid = [0.0f64; 3];
    for &p in plateau {
        let (x, y, z) = dims.coords(p);
        centroid[0] += x as f64 / n;
        centroid[1] += y as f64 / n;
        centroid[2] += z as f64 / n;
    }
    let distance = |p: usize| {
        let (x, y, z) = dims.coords(p);
        let dx = x as f64 - centroid[0];
        let dy = y as f64 - centroid[1];
        let dz = z as f64 - centroid[2];
        dx * dx + dy * dy + dz * dz
    };
    plateau
        .iter()
        .copied()
        .min_by(|&a, &b| distance(a).total_cmp(&distance(b)).then(a.cmp(&b)))
        .unwrap_or(plateau[0])
}

/// Find and rank all candidate maxima.
///
/// Marks maxima with `MAXIMUM` (plus `PLATEAU` for multi-pixel maxima) and
/// every flood-filled pixel with `LISTED`. Candidates are ordered by value
/// descending then index ascending, and numbered from 1 in that order.
pub(crate) fn find_maxima(
    values: &[f32],
    types: &mut PixelTypes,
    hood: &Neighbourhood,
) -> Vec<Maximum> {
    let dims = *hood.dims();
    let mut found: Vec<Maximum> = Vec::new();
    let mut queue = VecDeque::new();

    for index in 0..values.len() {
        if types.has(index, EXCLUDED | LISTED) {
            continue;
        }
        let v = values[index];

        let mut higher = false;
        let mut has_equal = false;
        for (_, n) in hood.neighbours(index) {
            if types.has(n, EXCLUDED) {
                continue;
            }
            if values[n] > v {
                higher = true;
                break;
            }
            if values[n] == v {
                has_equal = true;
            }
        }
        if higher {
            continue;
        }

        if !has_equal {
            types.set(index, MAXIMUM);
            found.push(Maximum {
                candidate: Candidate {
                    index,
                    value: v,
                    id: 0,
                },
                pixels: vec![index],
            });
            continue;
        }

        // Flood the whole plateau so it is never visited again
        let mut plateau = Vec::new();
        types.set(index, LISTED);
        queue.push_back(index);
        while let Some(p) = queue.pop_front() {
            plateau.push(p);
            for (_, n) in hood.neighbours(p) {
                if types.has(n, EXCLUDED) {
                    continue;
                }
                let nv = values[n];
                if nv > v {
                    higher = true;
                } else if nv == v && !types.has(n, LISTED) {
                    types.set(n, LISTED);
                    queue.push_back(n);
                }
            }
        }
        if higher {
            continue;
        }

        plateau.sort_unstable();
        for &p in &plateau {
            types.set(p, MAXIMUM | PLATEAU);
        }
        found.push(Maximum {
            candidate: Candidate {
                index: representative(&plateau, &dims),
                value: v,
                id: 0,
            },
            pixels: plateau,
        });
    }

    found.sort_by(|a, b| {
        b.candidate
            .value
            .total_cmp(&a.candidate.value)
            .then(a.candidate.index.cmp(&b.candidate.index))
    });
    for (rank, maximum) in found.iter_mut().enumerate() {
        maximum.candidate.id = rank as u32 + 1;
    }

    log::debug!("Found {} candidate maxima in {dims}", found.len());
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(values: &[f32], dims: ImageDims) -> (Vec<Maximum>, PixelTypes) {
        let hood = Neighbourhood::full(dims);
        let mut types = PixelTypes::new(values.len());
        let maxima = find_maxima(values, &mut types, &hood);
        (maxima, types)
    }

    #[test]
    fn test_single_pixel_maximum() {
        let dims = ImageDims::from_width_height(3, 3);
        let values = [1.0, 2.0, 1.0, 2.0, 9.0, 2.0, 1.0, 2.0, 1.0];
        let (maxima, types) = run(&values, dims);

        assert_eq!(maxima.len(), 1);
        assert_eq!(maxima[0].candidate.index, 4);
        assert_eq!(maxima[0].candidate.id, 1);
        assert!(types.has(4, MAXIMUM));
        assert!(!types.has(4, PLATEAU));
    }

    #[test]
    fn test_plateau_maximum_representative() {
        let dims = ImageDims::from_width_height(5, 3);
        #[rustfmt::skip]
        let values = [
            0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 5.0, 5.0, 5.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0,
        ];
        let (maxima, types) = run(&values, dims);

        assert_eq!(maxima.len(), 1);
        assert_eq!(maxima[0].pixels, vec![6, 7, 8]);
        assert_eq!(maxima[0].candidate.index, 7);
        assert!(types.has(6, MAXIMUM | PLATEAU));
        assert!(types.has(8, PLATEAU));
    }

    #[test]
    fn test_even_plateau_tie_takes_lowest_index() {
        let dims = ImageDims::from_width_height(4, 1);
        let values = [1.0, 3.0, 3.0, 1.0];
        let (maxima, _) = run(&values, dims);
        assert_eq!(maxima[0].candidate.index, 1);
    }

    #[test]
    fn test_shoulder_plateau_is_not_a_maximum() {
        let dims = ImageDims::from_width_height(5, 1);
        let values = [4.0, 4.0, 4.0, 6.0, 1.0];
        let (maxima, types) = run(&values, dims);

        assert_eq!(maxima.len(), 1);
        assert_eq!(maxima[0].candidate.index, 3);
        assert!(!types.has(0, MAXIMUM));
        assert!(types.has(0, LISTED));
    }

    #[test]
    fn test_excluded_neighbours_ignored() {
        let dims = ImageDims::from_width_height(3, 1);
        let values = [1.0, 5.0, 3.0];
        let hood = Neighbourhood::full(dims);
        let mut types = PixelTypes::new(3);
        types.set(1, EXCLUDED);
        let maxima = find_maxima(&values, &mut types, &hood);

        let indices: Vec<usize> = maxima.iter().map(|m| m.candidate.index).collect();
        assert_eq!(indices, vec![2, 0]);
    }

    #[test]
    fn test_ranking_value_then_index() {
        let dims = ImageDims::from_width_height(7, 1);
        let values = [5.0, 1.0, 8.0, 1.0, 5.0, 1.0, 0.0];
        let (maxima, _) = run(&values, dims);

        let order: Vec<(usize, u32)> = maxima
            .iter()
            .map(|m| (m.candidate.index, m.candidate.id))
            .collect();
        assert_eq!(order, vec![(2, 1), (0, 2), (4, 3)]);
    }

    #[test]
    fn test_3d_maximum_needs_all_planes() {
        let dims = ImageDims::new(3, 3, 2);
        let mut values = vec![1.0f32; dims.pixel_count()];
        values[dims.index(1, 1, 0)] = 5.0;
        values[dims.index(0, 0, 1)] = 7.0;
        let (maxima, _) = run(&values, dims);

        assert_eq!(maxima.len(), 1);
        assert_eq!(maxima[0].candidate.index, dims.index(0, 0, 1));
    }
}
