//! Post-hoc analysis of results against the input mask.

use shared::image_proc::{Connectivity, ObjectAnalyzer};

use crate::error::Result;
use crate::pixel::FociMask;
use crate::result::{FindFociResult, MaskState};

/// Set each result's mask state from the mask value at its maximum.
pub fn assign_mask_state(results: &mut [FindFociResult], mask: Option<&FociMask>) {
    for result in results.iter_mut() {
        result.mask_state = match mask {
            None => MaskState::NoMask,
            Some(m) => {
                let index = m.dims().index(result.x, result.y, result.z);
                if m.is_inside(index) {
                    MaskState::Inside
                } else {
                    MaskState::Outside
                }
            }
        };
    }
}

/// Label the connected objects of the mask and record the object holding
/// each result's maximum (0 = background).
///
/// # Returns
/// Number of objects in the mask
///
/// # Errors
/// `Objects` if the mask buffer does not match its dimensions
pub fn assign_objects(
    results: &mut [FindFociResult],
    mask: &FociMask,
    connectivity: Connectivity,
) -> Result<usize> {
    let analyzer = ObjectAnalyzer::new(mask.data(), *mask.dims(), connectivity)?;
    for result in results.iter_mut() {
        let index = mask.dims().index(result.x, result.y, result.z);
        result.object_id = analyzer.object_at(index);
    }
    log::debug!(
        "Assigned {} results to {} mask objects",
        results.len(),
        analyzer.object_count()
    );
    Ok(analyzer.object_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::image_proc::Aabb3;
    use shared::ImageDims;

    fn at(x: usize, y: usize) -> FindFociResult {
        FindFociResult {
            id: 1,
            x,
            y,
            z: 0,
            centre: [x as f64, y as f64, 0.0],
            count: 1,
            total_intensity: 0.0,
            average_intensity: 0.0,
            max_value: 0.0,
            highest_saddle_value: 0.0,
            saddle_neighbour_id: 0,
            count_above_saddle: 0,
            intensity_above_saddle: 0.0,
            total_intensity_above_background: 0.0,
            average_intensity_above_background: 0.0,
            intensity_above_minimum: 0.0,
            bounds: Aabb3::from_point(x, y, 0),
            sort_value: 0.0,
            object_id: 0,
            mask_state: MaskState::NoMask,
        }
    }

    #[rustfmt::skip]
    const MASK: [u32; 16] = [
        1, 1, 0, 0,
        0, 0, 0, 0,
        0, 0, 0, 1,
        0, 0, 1, 1,
    ];

    #[test]
    fn test_mask_state() {
        let mask = FociMask::new(&MASK, ImageDims::from_width_height(4, 4)).unwrap();
        let mut results = vec![at(0, 0), at(2, 1)];
        assign_mask_state(&mut results, Some(&mask));
        assert_eq!(results[0].mask_state, MaskState::Inside);
        assert_eq!(results[1].mask_state, MaskState::Outside);

        assign_mask_state(&mut results, None);
        assert!(results.iter().all(|r| r.mask_state == MaskState::NoMask));
    }

    #[test]
    fn test_object_ids() {
        let mask = FociMask::new(&MASK, ImageDims::from_width_height(4, 4)).unwrap();
        let mut results = vec![at(1, 0), at(3, 3), at(0, 3)];
        let count = assign_objects(&mut results, &mask, Connectivity::Eight).unwrap();
        assert_eq!(count, 2);
        assert_eq!(results[0].object_id, 1);
        assert_eq!(results[1].object_id, 2);
        assert_eq!(results[2].object_id, 0);
    }
}
