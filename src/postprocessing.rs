//! Decoder output to full-resolution binary mask
//!
//! Low-resolution predictions are upscaled to the padded square, cropped to
//! the pre-pad content at the top-left corner and resized again to the
//! original image size. Only then are they thresholded and cleaned up.

use crate::{
    config::PipelineConfig,
    error::{CutoutError, Result},
    types::{BinaryMask, Original, Resized, Size},
    utils::{morphology::MaskCleanup, resize::resize_bilinear, validation::TensorValidator},
};
use image::GrayImage;
use instant::Instant;
use ndarray::{s, Array2, ArrayView2};
use tracing::{debug, span, warn, Level};

/// Converts raw decoder output into a cleaned [`BinaryMask`]
#[derive(Debug, Clone)]
pub struct MaskPostprocessor {
    config: PipelineConfig,
    cleanup: MaskCleanup,
}

impl MaskPostprocessor {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let cleanup = MaskCleanup::new(config.cleanup.clone());
        Self { config, cleanup }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Index of the highest score, first one on ties.
    ///
    /// NaN scores never win over a finite score.
    #[must_use]
    pub fn select_candidate(scores: &[f32]) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, &score) in scores.iter().enumerate() {
            match best {
                None => best = Some((index, score)),
                Some((_, current)) if current.is_nan() && !score.is_nan() => {
                    best = Some((index, score));
                },
                Some((_, current)) if score > current => best = Some((index, score)),
                _ => {},
            }
        }
        best.map(|(index, _)| index)
    }

    /// Resize a low-resolution plane to model input, crop the padding away
    /// and resize to the original image size
    #[must_use]
    pub fn upscale_to_original(
        &self,
        plane: ArrayView2<'_, f32>,
        resized_size: Size<Resized>,
        original_size: Size<Original>,
    ) -> Array2<f32> {
        let edge = self.config.input_size;
        let model_space = resize_bilinear(plane, edge, edge);
        let height = (resized_size.height.min(edge)) as usize;
        let width = (resized_size.width.min(edge)) as usize;
        let cropped = model_space.slice(s![..height, ..width]);
        resize_bilinear(cropped, original_size.height, original_size.width)
    }

    /// Values strictly above `threshold` become 255, the rest 0
    #[must_use]
    pub fn binarize(plane: ArrayView2<'_, f32>, threshold: f32) -> GrayImage {
        let (height, width) = plane.dim();
        let data = plane
            .iter()
            .map(|&v| if v > threshold { 255 } else { 0 })
            .collect();
        // Buffer length always matches width * height here
        GrayImage::from_raw(width as u32, height as u32, data)
            .unwrap_or_else(|| GrayImage::new(width as u32, height as u32))
    }

    /// Select the best of N candidates and clean it up.
    ///
    /// `low_res_masks` holds `scores.len()` planes of
    /// `low_res_mask_size` x `low_res_mask_size` logits, row-major.
    ///
    /// # Errors
    /// Returns `CutoutError::InvalidTensor` when the buffer sizes disagree
    pub fn process_candidates(
        &self,
        scores: &[f32],
        low_res_masks: &[f32],
        resized_size: Size<Resized>,
        original_size: Size<Original>,
    ) -> Result<BinaryMask> {
        let _span = span!(
            Level::DEBUG,
            "postprocess_candidates",
            candidates = scores.len(),
            original = %original_size
        )
        .entered();
        let start = Instant::now();

        let side = self.config.low_res_mask_size as usize;
        let candidates =
            TensorValidator::validate_candidate_masks(scores, low_res_masks, side)?;
        let stack = ndarray::ArrayView3::from_shape((candidates, side, side), low_res_masks)
            .map_err(|e| CutoutError::invalid_tensor(format!("candidate masks: {}", e)))?;

        let binarized: Vec<GrayImage> = stack
            .outer_iter()
            .map(|plane| {
                let full = self.upscale_to_original(plane, resized_size, original_size);
                Self::binarize(full.view(), self.config.mask_threshold)
            })
            .collect();

        let selected = Self::select_candidate(scores)
            .ok_or_else(|| CutoutError::invalid_tensor("decoder returned no scores"))?;
        let chosen = binarized
            .into_iter()
            .nth(selected)
            .ok_or_else(|| CutoutError::processing("selected candidate out of range"))?;

        let cleaned = self.cleanup.apply(&chosen);
        let mask = BinaryMask::from_image(cleaned);

        debug!(
            selected,
            score = scores.get(selected).copied().unwrap_or_default(),
            foreground = mask.foreground_pixels(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Candidate mask selected"
        );
        Ok(mask)
    }

    /// Min-max normalize a float plane to the full 8-bit range.
    ///
    /// A flat plane maps to all zeros.
    #[must_use]
    pub fn normalize_min_max(plane: ArrayView2<'_, f32>) -> Array2<u8> {
        let (min, max) = plane
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        if !range.is_finite() || range <= f32::EPSILON {
            return Array2::zeros(plane.dim());
        }
        let scale = 255.0 / range;
        plane.mapv(|v| ((v - min) * scale).round().clamp(0.0, 255.0) as u8)
    }

    /// Single-mask path with the area confidence gate.
    ///
    /// The gate counts nonzero pixels of the normalized mask inside the
    /// pre-pad content region, at model resolution.
    ///
    /// # Errors
    /// - `CutoutError::InvalidTensor` for a wrongly sized or non-finite buffer
    /// - `CutoutError::BelowAreaThreshold` when too few pixels survive
    pub fn process_single(
        &self,
        mask: &[f32],
        resized_size: Size<Resized>,
        original_size: Size<Original>,
    ) -> Result<BinaryMask> {
        let _span = span!(Level::DEBUG, "postprocess_single", original = %original_size).entered();
        let start = Instant::now();

        let side = self.config.low_res_mask_size as usize;
        TensorValidator::validate_square_mask(mask, side)?;
        TensorValidator::validate_finite(mask)?;
        let plane = ArrayView2::from_shape((side, side), mask)
            .map_err(|e| CutoutError::invalid_tensor(format!("mask: {}", e)))?;
        let normalized = Self::normalize_min_max(plane);

        if let Some(threshold) = self.config.area_threshold {
            let scale = side as f64 / f64::from(self.config.input_size);
            let rows = ((f64::from(resized_size.height) * scale).round() as usize).min(side);
            let cols = ((f64::from(resized_size.width) * scale).round() as usize).min(side);
            let foreground = normalized
                .slice(s![..rows, ..cols])
                .iter()
                .filter(|v| **v != 0)
                .count();
            if foreground < threshold {
                warn!(foreground, threshold, "Mask rejected by area gate");
                return Err(CutoutError::BelowAreaThreshold {
                    foreground,
                    threshold,
                });
            }
        }

        let soft = normalized.mapv(f32::from);
        let full = self.upscale_to_original(soft.view(), resized_size, original_size);
        let (height, width) = full.dim();
        let data = full
            .iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect();
        let gray = GrayImage::from_raw(width as u32, height as u32, data)
            .ok_or_else(|| CutoutError::processing("mask buffer size mismatch"))?;

        let mask = BinaryMask::from_image(self.cleanup.apply(&gray));
        debug!(
            foreground = mask.foreground_pixels(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Single mask postprocessed"
        );
        Ok(mask)
    }
}
