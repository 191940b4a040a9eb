//! Morphological cleanup of binary masks
//!
//! Structuring elements are built with the same row-by-row construction as
//! OpenCV's `getStructuringElement`, so a 3x3 ellipse is a cross and a 5x5
//! cross covers only the centre row and column.

use crate::config::{CleanupConfig, KernelShape};
use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, grayscale_open, Mask};

/// Build a square structuring element of odd `size`
#[must_use]
pub fn structuring_element(shape: KernelShape, size: u32) -> Mask {
    let image = structuring_image(shape, size);
    let centre = (size / 2).min(u32::from(u8::MAX)) as u8;
    Mask::from_image(&image, centre, centre)
}

/// Structuring element as a 0/255 image, useful for inspection
#[must_use]
pub fn structuring_image(shape: KernelShape, size: u32) -> GrayImage {
    let size = size.max(1);
    let centre = size / 2;
    match shape {
        KernelShape::Rect => GrayImage::from_pixel(size, size, Luma([255])),
        KernelShape::Cross => GrayImage::from_fn(size, size, |x, y| {
            if x == centre || y == centre {
                Luma([255])
            } else {
                Luma([0])
            }
        }),
        KernelShape::Ellipse => {
            let r = f64::from(centre);
            let c = f64::from(centre);
            let inv_r2 = if centre == 0 { 0.0 } else { 1.0 / (r * r) };
            GrayImage::from_fn(size, size, |x, y| {
                let dy = f64::from(y) - r;
                let dx = (c * ((r * r - dy * dy) * inv_r2).sqrt()).round();
                let x = f64::from(x);
                if x >= c - dx && x <= c + dx {
                    Luma([255])
                } else {
                    Luma([0])
                }
            })
        },
    }
}

/// Normalized 1-D Gaussian weights of odd length `size`
#[must_use]
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let centre = (size as f32 - 1.0) / 2.0;
    let scale = -0.5 / (sigma * sigma);
    let weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - centre;
            (scale * d * d).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Reflect-101 border index (`gfedcb|abcdefgh|gfedcba`)
fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    let period = 2 * (len - 1);
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as usize
}

/// Separable Gaussian blur with reflect-101 borders, rounded back to 8 bit
#[must_use]
pub fn gaussian_blur(image: &GrayImage, size: u32, sigma: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let kernel = gaussian_kernel(size, sigma);
    let radius = (kernel.len() / 2) as isize;
    let (w, h) = (width as usize, height as usize);
    let src = image.as_raw();

    #[allow(clippy::indexing_slicing)]
    // Safe: every index passes through reflect_101 within the row/column
    let horizontal: Vec<f32> = (0..h * w)
        .map(|i| {
            let (y, x) = (i / w, i % w);
            kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    let sx = reflect_101(x as isize + k as isize - radius, w);
                    weight * f32::from(src[y * w + sx])
                })
                .sum()
        })
        .collect();

    #[allow(clippy::indexing_slicing)]
    let blurred = GrayImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let value: f32 = kernel
            .iter()
            .enumerate()
            .map(|(k, weight)| {
                let sy = reflect_101(y as isize + k as isize - radius, h);
                weight * horizontal[sy * w + x]
            })
            .sum();
        Luma([value.round().clamp(0.0, 255.0) as u8])
    });
    blurred
}

/// Binary threshold: values strictly above `threshold` become 255, others 0
#[must_use]
pub fn threshold(mut image: GrayImage, threshold: u8) -> GrayImage {
    for pixel in image.pixels_mut() {
        pixel[0] = if pixel[0] > threshold { 255 } else { 0 };
    }
    image
}

/// Fixed smoothing sequence applied to a selected 0/255 mask:
/// open, blur, optional dilate/erode, rethreshold
#[derive(Debug, Clone)]
pub struct MaskCleanup {
    config: CleanupConfig,
}

impl MaskCleanup {
    #[must_use]
    pub fn new(config: CleanupConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    /// Run the full cleanup sequence
    #[must_use]
    pub fn apply(&self, mask: &GrayImage) -> GrayImage {
        let config = &self.config;

        let open_kernel = structuring_element(config.open_shape, config.open_size);
        let mut result = grayscale_open(mask, &open_kernel);
        result = gaussian_blur(&result, config.blur_size, config.blur_sigma);

        if let Some(step) = &config.dilate_erode {
            let dilate_kernel = structuring_element(step.dilate_shape, step.kernel_size);
            let erode_kernel = structuring_element(step.erode_shape, step.kernel_size);
            for _ in 0..step.iterations {
                result = grayscale_dilate(&result, &dilate_kernel);
            }
            for _ in 0..step.iterations {
                result = grayscale_erode(&result, &erode_kernel);
            }
        }

        threshold(result, config.final_threshold)
    }
}
