//! Pixel access layer.
//!
//! The engine runs on a single `f32` working copy of the image, so every
//! supported sample kind only has to say how it converts to `f32` and whether
//! values must stay on the integer grid. Three kinds are supported: 8-bit and
//! 16-bit unsigned integers and 32-bit floats.
//!
//! [`FociImage`] borrows samples from a slice or an ndarray view when the memory
//! is contiguous and copies otherwise. [`FociMask`] does the same for `u32`
//! masks. [`ImageBuffer`] is the dynamically typed entry point for raw
//! little-endian bytes with a runtime bit depth.

use std::borrow::Cow;

use ndarray::{ArrayView2, ArrayView3};
use num_traits::{Bounded, ToPrimitive};
use shared::image_proc::round_half_up;
use shared::ImageDims;

use crate::error::{FindFociError, Result};

/// Sample type accepted by the engine.
pub trait FociPixel: Copy + Send + Sync + Bounded + ToPrimitive + 'static {
    /// Bits per sample (8, 16 or 32)
    const BIT_DEPTH: u32;

    /// Convert to the working representation
    fn as_f32(self) -> f32;

    /// Whether samples live on the integer grid
    fn is_integer() -> bool {
        Self::BIT_DEPTH != 32
    }

    /// Snap a working value back into this kind's value set.
    ///
    /// Integer kinds round half up and clamp to their range; floats pass through.
    fn snap(value: f32) -> f32 {
        if !Self::is_integer() {
            return value;
        }
        let lo = Self::min_value().to_f32().unwrap_or(0.0);
        let hi = Self::max_value().to_f32().unwrap_or(f32::MAX);
        (round_half_up(value as f64) as f32).clamp(lo, hi)
    }
}

impl FociPixel for u8 {
    const BIT_DEPTH: u32 = 8;

    fn as_f32(self) -> f32 {
        self as f32
    }
}

impl FociPixel for u16 {
    const BIT_DEPTH: u32 = 16;

    fn as_f32(self) -> f32 {
        self as f32
    }
}

impl FociPixel for f32 {
    const BIT_DEPTH: u32 = 32;

    fn as_f32(self) -> f32 {
        self
    }
}

fn check_len(dims: &ImageDims, actual: usize) -> Result<()> {
    if dims.is_empty() {
        return Err(FindFociError::EmptyImage(*dims));
    }
    if actual != dims.pixel_count() {
        return Err(FindFociError::BufferSizeMismatch {
            dims: *dims,
            expected: dims.pixel_count(),
            actual,
        });
    }
    Ok(())
}

fn dims_of_view3<T>(view: &ArrayView3<'_, T>) -> ImageDims {
    let (depth, height, width) = view.dim();
    ImageDims::new(width, height, depth)
}

/// Intensity image in x-fastest linear order.
#[derive(Debug, Clone)]
pub struct FociImage<'a, T: FociPixel> {
    data: Cow<'a, [T]>,
    dims: ImageDims,
}

impl<'a, T: FociPixel> FociImage<'a, T> {
    /// Borrow a linear buffer.
    ///
    /// # Errors
    /// * `EmptyImage` if any dimension is zero
    /// * `BufferSizeMismatch` if `data.len() != dims.pixel_count()`
    pub fn new(data: &'a [T], dims: ImageDims) -> Result<Self> {
        check_len(&dims, data.len())?;
        Ok(Self {
            data: Cow::Borrowed(data),
            dims,
        })
    }

    /// Take ownership of a linear buffer
    pub fn from_vec(data: Vec<T>, dims: ImageDims) -> Result<FociImage<'static, T>> {
        check_len(&dims, data.len())?;
        Ok(FociImage {
            data: Cow::Owned(data),
            dims,
        })
    }

    /// Wrap a 2D view with axis order (y, x)
    pub fn from_array2(view: ArrayView2<'a, T>) -> Result<Self> {
        let (height, width) = view.dim();
        let dims = ImageDims::from_width_height(width, height);
        check_len(&dims, view.len())?;
        let data = match view.to_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(view.iter().copied().collect()),
        };
        Ok(Self { data, dims })
    }

    /// Wrap a 3D view with axis order (z, y, x)
    pub fn from_array3(view: ArrayView3<'a, T>) -> Result<Self> {
        let dims = dims_of_view3(&view);
        check_len(&dims, view.len())?;
        let data = match view.to_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(view.iter().copied().collect()),
        };
        Ok(Self { data, dims })
    }

    pub fn dims(&self) -> &ImageDims {
        &self.dims
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Sample at a linear index
    pub fn get(&self, index: usize) -> T {
        self.data[index]
    }

    /// Working copy of the samples as `f32`
    pub fn to_working(&self) -> Vec<f32> {
        self.data.iter().map(|v| v.as_f32()).collect()
    }
}

/// Region mask; non-zero values are inside.
///
/// Distinct non-zero values name distinct mask objects.
#[derive(Debug, Clone)]
pub struct FociMask<'a> {
    data: Cow<'a, [u32]>,
    dims: ImageDims,
}

impl<'a> FociMask<'a> {
    pub fn new(data: &'a [u32], dims: ImageDims) -> Result<Self> {
        check_len(&dims, data.len())?;
        Ok(Self {
            data: Cow::Borrowed(data),
            dims,
        })
    }

    pub fn from_vec(data: Vec<u32>, dims: ImageDims) -> Result<FociMask<'static>> {
        check_len(&dims, data.len())?;
        Ok(FociMask {
            data: Cow::Owned(data),
            dims,
        })
    }

    pub fn from_array2(view: ArrayView2<'a, u32>) -> Result<Self> {
        let (height, width) = view.dim();
        let dims = ImageDims::from_width_height(width, height);
        check_len(&dims, view.len())?;
        let data = match view.to_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(view.iter().copied().collect()),
        };
        Ok(Self { data, dims })
    }

    pub fn from_array3(view: ArrayView3<'a, u32>) -> Result<Self> {
        let dims = dims_of_view3(&view);
        check_len(&dims, view.len())?;
        let data = match view.to_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(view.iter().copied().collect()),
        };
        Ok(Self { data, dims })
    }

    pub fn dims(&self) -> &ImageDims {
        &self.dims
    }

    pub fn data(&self) -> &[u32] {
        &self.data
    }

    pub fn is_inside(&self, index: usize) -> bool {
        self.data[index] != 0
    }

    /// Number of pixels inside the mask
    pub fn inside_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

/// Owned image with a bit depth chosen at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageBuffer {
    U8 { data: Vec<u8>, dims: ImageDims },
    U16 { data: Vec<u16>, dims: ImageDims },
    F32 { data: Vec<f32>, dims: ImageDims },
}

impl ImageBuffer {
    /// Decode little-endian samples.
    ///
    /// # Arguments
    /// * `bit_depth` - 8, 16 or 32 (32 = IEEE float)
    /// * `dims` - Image dimensions
    /// * `bytes` - Raw sample bytes, x-fastest
    ///
    /// # Errors
    /// * `UnsupportedBitDepth` for any other depth
    /// * `EmptyImage` / `BufferSizeMismatch` for a bad buffer
    pub fn from_le_bytes(bit_depth: u32, dims: ImageDims, bytes: &[u8]) -> Result<Self> {
        let sample_bytes = match bit_depth {
            8 => 1,
            16 => 2,
            32 => 4,
            other => return Err(FindFociError::UnsupportedBitDepth(other)),
        };
        if dims.is_empty() {
            return Err(FindFociError::EmptyImage(dims));
        }
        if bytes.len() != dims.pixel_count() * sample_bytes {
            return Err(FindFociError::BufferSizeMismatch {
                dims,
                expected: dims.pixel_count(),
                actual: bytes.len() / sample_bytes,
            });
        }

        Ok(match bit_depth {
            8 => ImageBuffer::U8 {
                data: bytes.to_vec(),
                dims,
            },
            16 => ImageBuffer::U16 {
                data: bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
                dims,
            },
            _ => ImageBuffer::F32 {
                data: bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
                dims,
            },
        })
    }

    pub fn bit_depth(&self) -> u32 {
        match self {
            ImageBuffer::U8 { .. } => u8::BIT_DEPTH,
            ImageBuffer::U16 { .. } => u16::BIT_DEPTH,
            ImageBuffer::F32 { .. } => f32::BIT_DEPTH,
        }
    }

    pub fn dims(&self) -> &ImageDims {
        match self {
            ImageBuffer::U8 { dims, .. }
            | ImageBuffer::U16 { dims, .. }
            | ImageBuffer::F32 { dims, .. } => dims,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array2, Array3};

    #[test]
    fn test_snap_integer_kinds() {
        assert_eq!(u8::snap(2.5), 3.0);
        assert_eq!(u8::snap(-4.0), 0.0);
        assert_eq!(u8::snap(300.2), 255.0);
        assert_eq!(u16::snap(1.49), 1.0);
        assert_eq!(f32::snap(1.49), 1.49);
    }

    #[test]
    fn test_buffer_length_checked() {
        let data = [1u16; 5];
        let err = FociImage::new(&data, ImageDims::from_width_height(2, 2)).unwrap_err();
        assert!(matches!(
            err,
            FindFociError::BufferSizeMismatch {
                expected: 4,
                actual: 5,
                ..
            }
        ));

        let err = FociImage::<u8>::new(&[], ImageDims::from_width_height(0, 3)).unwrap_err();
        assert!(matches!(err, FindFociError::EmptyImage(_)));
    }

    #[test]
    fn test_from_array2_borrows_contiguous() {
        let array = Array2::from_shape_fn((3, 4), |(y, x)| (y * 4 + x) as u8);
        let image = FociImage::from_array2(array.view()).unwrap();
        assert_eq!(image.dims(), &ImageDims::from_width_height(4, 3));
        assert_eq!(image.get(6), 6);
        assert!(matches!(image.data, Cow::Borrowed(_)));
    }

    #[test]
    fn test_from_array2_copies_strided_view() {
        let array = Array2::from_shape_fn((4, 4), |(y, x)| (y * 4 + x) as u16);
        let view = array.slice(s![.., 1..3]);
        let image = FociImage::from_array2(view).unwrap();
        assert_eq!(image.dims(), &ImageDims::from_width_height(2, 4));
        assert_eq!(image.data(), &[1, 2, 5, 6, 9, 10, 13, 14]);
    }

    #[test]
    fn test_from_array3_axis_order() {
        let array = Array3::from_shape_fn((2, 3, 4), |(z, y, x)| (z * 100 + y * 10 + x) as f32);
        let image = FociImage::from_array3(array.view()).unwrap();
        let dims = *image.dims();
        assert_eq!(dims, ImageDims::new(4, 3, 2));
        assert_eq!(image.get(dims.index(3, 2, 1)), 123.0);
    }

    #[test]
    fn test_image_buffer_decoding() {
        let dims = ImageDims::from_width_height(2, 1);
        let buffer = ImageBuffer::from_le_bytes(16, dims, &[0x01, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(
            buffer,
            ImageBuffer::U16 {
                data: vec![1, 256],
                dims
            }
        );
        assert_eq!(buffer.bit_depth(), 16);

        let bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let buffer = ImageBuffer::from_le_bytes(32, dims, &bytes).unwrap();
        assert!(matches!(buffer, ImageBuffer::F32 { ref data, .. } if data == &vec![1.5, -2.0]));
    }

    #[test]
    fn test_image_buffer_rejects_bit_depth() {
        let dims = ImageDims::from_width_height(1, 1);
        assert!(matches!(
            ImageBuffer::from_le_bytes(12, dims, &[0, 0]),
            Err(FindFociError::UnsupportedBitDepth(12))
        ));
        assert!(matches!(
            ImageBuffer::from_le_bytes(16, dims, &[0]),
            Err(FindFociError::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_mask_inside() {
        let data = [0u32, 3, 0, 1];
        let mask = FociMask::new(&data, ImageDims::from_width_height(2, 2)).unwrap();
        assert!(mask.is_inside(1));
        assert!(!mask.is_inside(2));
        assert_eq!(mask.inside_count(), 2);
    }
}
