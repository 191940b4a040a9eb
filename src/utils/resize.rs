//! Longest-side resizing for images, masks and prompt coordinates
//!
//! One bilinear primitive serves the image and every mask resize so that
//! the selected mask lines up with the pixels it was predicted from.

use crate::types::{Original, Resized, Size};
use image::RgbImage;
use ndarray::{Array2, ArrayView2};

/// Resizes images and coordinates so the longest side equals a fixed length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeLongestSide {
    target_length: u32,
}

impl ResizeLongestSide {
    #[must_use]
    pub const fn new(target_length: u32) -> Self {
        Self { target_length }
    }

    #[must_use]
    pub const fn target_length(&self) -> u32 {
        self.target_length
    }

    /// Output `(height, width)` for an input of `old_h` x `old_w`.
    ///
    /// Rounds half up by adding 0.5 and truncating.
    #[must_use]
    pub fn compute_target_shape(old_h: u32, old_w: u32, long_side_length: u32) -> (u32, u32) {
        let longest = old_h.max(old_w);
        if longest == 0 {
            return (0, 0);
        }
        let scale = f64::from(long_side_length) / f64::from(longest);
        let new_h = f64::from(old_h) * scale;
        let new_w = f64::from(old_w) * scale;
        ((new_h + 0.5) as u32, (new_w + 0.5) as u32)
    }

    /// Resized (pre-pad) size for an image of `original` size
    #[must_use]
    pub fn target_size(&self, original: Size<Original>) -> Size<Resized> {
        let (height, width) =
            Self::compute_target_shape(original.height, original.width, self.target_length);
        Size::new(height, width)
    }

    /// Resize an RGB image to its longest-side target shape
    #[must_use]
    pub fn apply_image(&self, image: &RgbImage) -> RgbImage {
        let target = self.target_size(Size::from_dimensions(image.dimensions()));
        resize_rgb_bilinear(image, target.height, target.width)
    }

    /// Map original-space `(x, y)` coordinates into resized space
    #[must_use]
    pub fn apply_coords(&self, coords: &[(f32, f32)], original: Size<Original>) -> Vec<(f32, f32)> {
        let (scale_x, scale_y) = self.coordinate_scale(original);
        coords
            .iter()
            .map(|&(x, y)| (x * scale_x, y * scale_y))
            .collect()
    }

    /// Inverse of [`Self::apply_coords`]
    #[must_use]
    pub fn restore_coords(
        &self,
        coords: &[(f32, f32)],
        original: Size<Original>,
    ) -> Vec<(f32, f32)> {
        let (scale_x, scale_y) = self.coordinate_scale(original);
        coords
            .iter()
            .map(|&(x, y)| (x / scale_x, y / scale_y))
            .collect()
    }

    fn coordinate_scale(&self, original: Size<Original>) -> (f32, f32) {
        let target = self.target_size(original);
        let ratio = |new: u32, old: u32| {
            if old == 0 {
                1.0
            } else {
                new as f32 / old as f32
            }
        };
        (
            ratio(target.width, original.width),
            ratio(target.height, original.height),
        )
    }
}

/// Source sample positions for one output axis
struct AxisTaps {
    lo: Vec<usize>,
    hi: Vec<usize>,
    frac: Vec<f32>,
}

impl AxisTaps {
    /// Half-pixel centred sampling with clamp-to-edge
    fn new(src_len: usize, dst_len: usize) -> Self {
        let mut lo = Vec::with_capacity(dst_len);
        let mut hi = Vec::with_capacity(dst_len);
        let mut frac = Vec::with_capacity(dst_len);
        let scale = src_len as f64 / dst_len.max(1) as f64;
        let last = src_len.saturating_sub(1);

        for dst in 0..dst_len {
            let pos = (dst as f64 + 0.5) * scale - 0.5;
            let floor = pos.floor();
            let (index, weight) = if pos < 0.0 {
                (0, 0.0)
            } else if floor as usize >= last {
                (last, 0.0)
            } else {
                (floor as usize, pos - floor)
            };
            lo.push(index);
            hi.push((index + 1).min(last));
            frac.push(weight as f32);
        }

        Self { lo, hi, frac }
    }
}

/// Bilinear resize of a single-channel float plane to `height` x `width`.
///
/// Values are not clamped, so signed logits keep their sign.
#[must_use]
pub fn resize_bilinear(src: ArrayView2<'_, f32>, height: u32, width: u32) -> Array2<f32> {
    let (src_h, src_w) = src.dim();
    let (dst_h, dst_w) = (height as usize, width as usize);
    if src_h == 0 || src_w == 0 {
        return Array2::zeros((dst_h, dst_w));
    }
    if (src_h, src_w) == (dst_h, dst_w) {
        return src.to_owned();
    }

    let rows = AxisTaps::new(src_h, dst_h);
    let cols = AxisTaps::new(src_w, dst_w);

    #[allow(clippy::indexing_slicing)]
    // Safe: taps are clamped to the source extent
    let resized = Array2::from_shape_fn((dst_h, dst_w), |(y, x)| {
        let (y0, y1, fy) = (rows.lo[y], rows.hi[y], rows.frac[y]);
        let (x0, x1, fx) = (cols.lo[x], cols.hi[x], cols.frac[x]);
        let top = src[[y0, x0]] * (1.0 - fx) + src[[y0, x1]] * fx;
        let bottom = src[[y1, x0]] * (1.0 - fx) + src[[y1, x1]] * fx;
        top * (1.0 - fy) + bottom * fy
    });
    resized
}

/// Bilinear resize of an 8-bit RGB image, rounding to nearest
#[must_use]
pub fn resize_rgb_bilinear(src: &RgbImage, height: u32, width: u32) -> RgbImage {
    let (src_w, src_h) = src.dimensions();
    if src_w == 0 || src_h == 0 {
        return RgbImage::new(width, height);
    }
    if (src_h, src_w) == (height, width) {
        return src.clone();
    }

    let rows = AxisTaps::new(src_h as usize, height as usize);
    let cols = AxisTaps::new(src_w as usize, width as usize);

    #[allow(clippy::indexing_slicing)]
    // Safe: taps are clamped to the source extent
    let resized = RgbImage::from_fn(width, height, |x, y| {
        let (y, x) = (y as usize, x as usize);
        let (y0, y1, fy) = (rows.lo[y] as u32, rows.hi[y] as u32, rows.frac[y]);
        let (x0, x1, fx) = (cols.lo[x] as u32, cols.hi[x] as u32, cols.frac[x]);
        let p00 = src.get_pixel(x0, y0);
        let p01 = src.get_pixel(x1, y0);
        let p10 = src.get_pixel(x0, y1);
        let p11 = src.get_pixel(x1, y1);

        let mut out = [0u8; 3];
        for (c, value) in out.iter_mut().enumerate() {
            let top = f32::from(p00[c]) * (1.0 - fx) + f32::from(p01[c]) * fx;
            let bottom = f32::from(p10[c]) * (1.0 - fx) + f32::from(p11[c]) * fx;
            *value = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
        image::Rgb(out)
    });
    resized
}
