//! Core data types shared by the segmentation and background-removal pipelines

use crate::error::{CutoutError, Result};
use image::GrayImage;
use ndarray::{Array4, ArrayView4};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Marker for the source photograph's pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Original;

/// Marker for the longest-side resized space (before padding)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resized;

/// Marker for the padded square model-input space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelInput;

/// A (height, width) pair tagged with the coordinate space it belongs to.
///
/// Converting between spaces goes through [`crate::utils::ResizeLongestSide`];
/// the tag keeps an original-space size from being handed to code that
/// expects a resized one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size<S> {
    pub height: u32,
    pub width: u32,
    space: PhantomData<S>,
}

impl<S> Size<S> {
    #[must_use]
    pub const fn new(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            space: PhantomData,
        }
    }

    /// Build from `image` crate `(width, height)` dimensions
    #[must_use]
    pub fn from_dimensions(dimensions: (u32, u32)) -> Self {
        Self::new(dimensions.1, dimensions.0)
    }

    /// Dimensions in `image` crate order `(width, height)`
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub const fn area(&self) -> usize {
        self.height as usize * self.width as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }
}

impl<S> fmt::Display for Size<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Tight bounding box of the nonzero pixels of a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Zero-area box returned for empty masks
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[must_use]
    pub const fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Single-channel mask in original-image space holding only 0 or 255
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    image: GrayImage,
}

impl BinaryMask {
    pub const FOREGROUND: u8 = 255;
    pub const BACKGROUND: u8 = 0;

    /// Wrap a grayscale image, snapping every nonzero pixel to 255
    #[must_use]
    pub fn from_image(mut image: GrayImage) -> Self {
        for pixel in image.pixels_mut() {
            if pixel[0] != Self::BACKGROUND {
                pixel[0] = Self::FOREGROUND;
            }
        }
        Self { image }
    }

    /// Create a mask from row-major data
    pub fn from_raw(size: Size<Original>, data: Vec<u8>) -> Result<Self> {
        let expected = size.area();
        let actual = data.len();
        let image = GrayImage::from_raw(size.width, size.height, data).ok_or_else(|| {
            CutoutError::invalid_tensor(format!(
                "mask data has {} bytes, expected {} for {}",
                actual, expected, size
            ))
        })?;
        Ok(Self::from_image(image))
    }

    #[must_use]
    pub fn size(&self) -> Size<Original> {
        Size::from_dimensions(self.image.dimensions())
    }

    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.image
    }

    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Number of foreground pixels
    #[must_use]
    pub fn foreground_pixels(&self) -> usize {
        self.image.pixels().filter(|p| p[0] != 0).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.pixels().all(|p| p[0] == 0)
    }

    /// Min/max nonzero row and column; empty masks yield a zero-area box
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in self.image.enumerate_pixels() {
            if pixel[0] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x_min, y_min, x_max, y_max)) => {
                    (x_min.min(x), y_min.min(y), x_max.max(x), y_max.max(y))
                },
            });
        }

        match bounds {
            Some((x_min, y_min, x_max, y_max)) => BoundingBox {
                x: x_min,
                y: y_min,
                width: x_max - x_min + 1,
                height: y_max - y_min + 1,
            },
            None => BoundingBox::empty(),
        }
    }
}

/// Image embedding produced by the encoder stage, shape (1, 256, 64, 64)
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTensor {
    data: Array4<f32>,
}

impl FeatureTensor {
    pub const SHAPE: (usize, usize, usize, usize) = (1, 256, 64, 64);

    /// Wrap an embedding, rejecting any other shape
    pub fn new(data: Array4<f32>) -> Result<Self> {
        if data.dim() != Self::SHAPE {
            return Err(CutoutError::invalid_tensor(format!(
                "feature tensor must have shape {:?}, got {:?}",
                Self::SHAPE,
                data.dim()
            )));
        }
        Ok(Self { data })
    }

    /// Reinterpret a flat row-major buffer as (1, 256, 64, 64)
    pub fn from_flat(values: Vec<f32>) -> Result<Self> {
        let len = values.len();
        let data = Array4::from_shape_vec(Self::SHAPE, values).map_err(|_| {
            CutoutError::invalid_tensor(format!(
                "feature buffer holds {} values, expected {}",
                len,
                Self::SHAPE.0 * Self::SHAPE.1 * Self::SHAPE.2 * Self::SHAPE.3
            ))
        })?;
        Ok(Self { data })
    }

    #[must_use]
    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }
}

/// Raw decoder output: one score per candidate plus the flattened
/// `N * 256 * 256` low-resolution mask logits
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DecoderOutput {
    pub scores: Vec<f32>,
    pub low_res_masks: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_display_and_dimensions() {
        let size: Size<Original> = Size::new(1000, 2000);
        assert_eq!(size.dimensions(), (2000, 1000));
        assert_eq!(size.to_string(), "2000x1000");
        assert_eq!(size.area(), 2_000_000);
        assert!(!size.is_empty());
        assert!(Size::<Resized>::new(0, 10).is_empty());
    }

    #[test]
    fn test_binary_mask_snaps_to_255() {
        let mask = BinaryMask::from_raw(Size::new(2, 2), vec![0, 1, 128, 255]).unwrap();
        assert_eq!(mask.as_raw(), &[0, 255, 255, 255]);
        assert_eq!(mask.foreground_pixels(), 3);
    }

    #[test]
    fn test_binary_mask_rejects_wrong_length() {
        let result = BinaryMask::from_raw(Size::new(3, 3), vec![0; 4]);
        assert!(matches!(result, Err(CutoutError::InvalidTensor(_))));
    }

    #[test]
    fn test_bounding_box() {
        let mut image = GrayImage::new(10, 8);
        image.put_pixel(2, 3, image::Luma([255]));
        image.put_pixel(6, 5, image::Luma([255]));
        let mask = BinaryMask::from_image(image);

        let bbox = mask.bounding_box();
        assert_eq!(
            bbox,
            BoundingBox {
                x: 2,
                y: 3,
                width: 5,
                height: 3
            }
        );
    }

    #[test]
    fn test_bounding_box_of_empty_mask() {
        let mask = BinaryMask::from_image(GrayImage::new(16, 16));
        assert!(mask.is_empty());
        let bbox = mask.bounding_box();
        assert!(bbox.is_empty());
        assert_eq!(bbox.area(), 0);
    }

    #[test]
    fn test_feature_tensor_shape_check() {
        assert!(FeatureTensor::new(Array4::zeros((1, 256, 64, 64))).is_ok());
        assert!(FeatureTensor::new(Array4::zeros((1, 256, 32, 32))).is_err());
        assert!(FeatureTensor::from_flat(vec![0.0; 256 * 64 * 64]).is_ok());
        assert!(FeatureTensor::from_flat(vec![0.0; 10]).is_err());
    }
}
