//! Per-pixel working flags.
//!
//! One byte per pixel, owned by a single `exec` call and dropped with it.

/// Pixel is (part of) a local maximum
pub const MAXIMUM: u8 = 0x01;
/// Pixel belongs to a maximum plateau
pub const PLATEAU: u8 = 0x02;
/// Pixel touches a pixel of another peak
pub const SADDLE: u8 = 0x04;
/// Pixel realises the highest saddle between two peaks
pub const SADDLE_POINT: u8 = 0x08;
/// Pixel is outside the mask or below the background
pub const EXCLUDED: u8 = 0x10;
/// Pixel has been visited by a plateau fill
pub const LISTED: u8 = 0x20;

/// Steepest-ascent direction of a pixel with no strictly higher neighbour
pub const NO_DIRECTION: u8 = u8::MAX;

/// Packed flag set for every pixel of the working image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelTypes {
    bits: Vec<u8>,
}

impl PixelTypes {
    pub fn new(pixel_count: usize) -> Self {
        Self {
            bits: vec![0; pixel_count],
        }
    }

    #[inline]
    pub fn has(&self, index: usize, flag: u8) -> bool {
        self.bits[index] & flag != 0
    }

    #[inline]
    pub fn set(&mut self, index: usize, flag: u8) {
        self.bits[index] |= flag;
    }

    #[inline]
    pub fn clear(&mut self, index: usize, flag: u8) {
        self.bits[index] &= !flag;
    }

    /// Number of pixels carrying any of the given flags
    pub fn count(&self, flag: u8) -> usize {
        self.bits.iter().filter(|&&b| b & flag != 0).count()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_independent() {
        let mut types = PixelTypes::new(3);
        types.set(1, MAXIMUM | PLATEAU);
        types.set(1, SADDLE);
        types.clear(1, PLATEAU);

        assert!(types.has(1, MAXIMUM));
        assert!(!types.has(1, PLATEAU));
        assert!(types.has(1, SADDLE));
        assert!(!types.has(0, MAXIMUM));
        assert_eq!(types.count(MAXIMUM | EXCLUDED), 1);
    }

    #[test]
    fn test_flag_bits_distinct() {
        let all = [MAXIMUM, PLATEAU, SADDLE, SADDLE_POINT, EXCLUDED, LISTED];
        let combined = all.iter().fold(0u8, |acc, f| {
            assert_eq!(acc & f, 0);
            acc | f
        });
        assert_eq!(combined.count_ones(), 6);
    }
}
