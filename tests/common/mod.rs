//! Shared fixtures for integration tests

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Write a synthetic photograph: a warm disc on a cool gradient
pub(crate) fn write_test_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = width.min(height) as f32 / 4.0;
    let image = RgbImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        if (dx * dx + dy * dy).sqrt() < radius {
            Rgb([220, 120, 40])
        } else {
            Rgb([20, (y * 255 / height.max(1)) as u8, 180])
        }
    });
    let path = dir.join(name);
    image.save(&path).expect("failed to write test image");
    path
}

/// Raw saliency map with `count` leading foreground values
pub(crate) fn leading_foreground_mask(side: usize, count: usize) -> Vec<f32> {
    let mut mask = vec![0.0f32; side * side];
    for value in mask.iter_mut().take(count) {
        *value = 1.0;
    }
    mask
}
