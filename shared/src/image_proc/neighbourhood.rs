//! Pixel neighbourhoods for 2D images and 3D stacks.
//!
//! Offsets are listed in a fixed order: the eight in-plane neighbours clockwise
//! starting from north (y - 1), then the plane below (z - 1, centre first and the
//! same clockwise ring), then the plane above (z + 1). Several algorithms store a
//! neighbour as its position in this table, so the order must never change.

use crate::image_size::ImageDims;
use serde::{Deserialize, Serialize};

/// Offset (dx, dy, dz) to a neighbouring pixel
pub type Offset = (isize, isize, isize);

const RING_DX: [isize; 8] = [0, 1, 1, 1, 0, -1, -1, -1];
const RING_DY: [isize; 8] = [-1, -1, 0, 1, 1, 1, 0, -1];

/// All 26 neighbour offsets in table order
pub const FULL_OFFSETS: [Offset; 26] = build_full_offsets();

const fn build_full_offsets() -> [Offset; 26] {
    let mut out = [(0isize, 0isize, 0isize); 26];
    let mut i = 0;
    while i < 8 {
        out[i] = (RING_DX[i], RING_DY[i], 0);
        i += 1;
    }
    out[8] = (0, 0, -1);
    let mut i = 0;
    while i < 8 {
        out[9 + i] = (RING_DX[i], RING_DY[i], -1);
        i += 1;
    }
    out[17] = (0, 0, 1);
    let mut i = 0;
    while i < 8 {
        out[18 + i] = (RING_DX[i], RING_DY[i], 1);
        i += 1;
    }
    out
}

/// Pixel connectivity for labelling and region operations.
///
/// In 3D `Four` extends to the 6 face neighbours and `Eight` to all 26.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Connectivity {
    /// Edge-sharing neighbours only
    Four,
    /// Edge and corner sharing neighbours
    #[default]
    Eight,
}

impl Connectivity {
    /// Neighbour offsets for this connectivity, in table order.
    pub fn offsets(&self, is_3d: bool) -> Vec<Offset> {
        match (self, is_3d) {
            (Connectivity::Eight, false) => FULL_OFFSETS[..8].to_vec(),
            (Connectivity::Eight, true) => FULL_OFFSETS.to_vec(),
            (Connectivity::Four, false) => vec![(0, -1, 0), (1, 0, 0), (0, 1, 0), (-1, 0, 0)],
            (Connectivity::Four, true) => vec![
                (0, -1, 0),
                (1, 0, 0),
                (0, 1, 0),
                (-1, 0, 0),
                (0, 0, -1),
                (0, 0, 1),
            ],
        }
    }
}

/// Neighbourhood bound to a set of image dimensions.
///
/// Precomputes the linear index delta of every offset so the hot loops only
/// check bounds and add.
#[derive(Debug, Clone)]
pub struct Neighbourhood {
    dims: ImageDims,
    offsets: Vec<Offset>,
    deltas: Vec<isize>,
}

impl Neighbourhood {
    /// Full neighbourhood (8 in 2D, 26 in 3D) in table order
    pub fn full(dims: ImageDims) -> Self {
        Self::with_connectivity(dims, Connectivity::Eight)
    }

    /// Neighbourhood for an explicit connectivity
    pub fn with_connectivity(dims: ImageDims, connectivity: Connectivity) -> Self {
        let offsets = connectivity.offsets(dims.is_3d());
        let width = dims.width as isize;
        let slice = dims.slice_size() as isize;
        let deltas = offsets
            .iter()
            .map(|&(dx, dy, dz)| dz * slice + dy * width + dx)
            .collect();
        Self {
            dims,
            offsets,
            deltas,
        }
    }

    /// Image dimensions this neighbourhood was built for
    pub fn dims(&self) -> &ImageDims {
        &self.dims
    }

    /// Number of neighbour directions
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the neighbourhood has no directions
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offset of a direction
    pub fn offset(&self, direction: usize) -> Offset {
        self.offsets[direction]
    }

    /// Linear index of the neighbour in `direction`, or `None` if out of bounds.
    pub fn neighbour(&self, index: usize, direction: usize) -> Option<usize> {
        let (x, y, z) = self.dims.coords(index);
        let (dx, dy, dz) = self.offsets[direction];
        if self
            .dims
            .contains(x as isize + dx, y as isize + dy, z as isize + dz)
        {
            Some((index as isize + self.deltas[direction]) as usize)
        } else {
            None
        }
    }

    /// Iterate `(direction, neighbour_index)` over all in-bounds neighbours
    pub fn neighbours(&self, index: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (x, y, z) = self.dims.coords(index);
        let (x, y, z) = (x as isize, y as isize, z as isize);
        self.offsets
            .iter()
            .zip(self.deltas.iter())
            .enumerate()
            .filter_map(move |(direction, (&(dx, dy, dz), &delta))| {
                if self.dims.contains(x + dx, y + dy, z + dz) {
                    Some((direction, (index as isize + delta) as usize))
                } else {
                    None
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_offset_order() {
        assert_eq!(FULL_OFFSETS[0], (0, -1, 0));
        assert_eq!(FULL_OFFSETS[2], (1, 0, 0));
        assert_eq!(FULL_OFFSETS[7], (-1, -1, 0));
        assert_eq!(FULL_OFFSETS[8], (0, 0, -1));
        assert_eq!(FULL_OFFSETS[9], (0, -1, -1));
        assert_eq!(FULL_OFFSETS[17], (0, 0, 1));
        assert_eq!(FULL_OFFSETS[25], (-1, -1, 1));
    }

    #[test]
    fn test_offsets_unique() {
        let mut sorted = FULL_OFFSETS.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 26);
        assert!(!sorted.contains(&(0, 0, 0)));
    }

    #[test]
    fn test_connectivity_sizes() {
        assert_eq!(Connectivity::Four.offsets(false).len(), 4);
        assert_eq!(Connectivity::Eight.offsets(false).len(), 8);
        assert_eq!(Connectivity::Four.offsets(true).len(), 6);
        assert_eq!(Connectivity::Eight.offsets(true).len(), 26);
    }

    #[test]
    fn test_corner_neighbours() {
        let dims = ImageDims::from_width_height(3, 3);
        let hood = Neighbourhood::full(dims);
        let found: Vec<usize> = hood.neighbours(0).map(|(_, n)| n).collect();
        // East, south-east, south
        assert_eq!(found, vec![1, 4, 3]);

        let centre: Vec<usize> = hood.neighbours(4).map(|(_, n)| n).collect();
        assert_eq!(centre, vec![1, 2, 5, 8, 7, 6, 3, 0]);
    }

    #[test]
    fn test_neighbour_across_slices() {
        let dims = ImageDims::new(3, 3, 3);
        let hood = Neighbourhood::full(dims);
        let centre = dims.index(1, 1, 1);

        assert_eq!(hood.neighbours(centre).count(), 26);
        assert_eq!(hood.neighbour(centre, 8), Some(dims.index(1, 1, 0)));
        assert_eq!(hood.neighbour(centre, 17), Some(dims.index(1, 1, 2)));
        assert_eq!(hood.neighbour(dims.index(1, 1, 0), 8), None);
    }

    #[test]
    fn test_no_wrap_at_row_end() {
        let dims = ImageDims::from_width_height(4, 2);
        let hood = Neighbourhood::full(dims);
        // (3, 0) has no east neighbour even though index 4 exists
        assert_eq!(hood.neighbour(3, 2), None);
    }
}
