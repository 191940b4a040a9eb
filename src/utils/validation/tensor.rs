//! Tensor validation utilities
//!
//! Centralizes the shape and length checks applied to buffers handed in
//! by an external inference engine.

use crate::error::{CutoutError, Result};
use crate::types::{Original, Size};
use ndarray::Array4;

/// Validator for tensor shapes and flat buffer lengths
pub struct TensorValidator;

impl TensorValidator {
    /// Validate tensor shape matches expected dimensions
    pub fn validate_tensor_shape(
        tensor: &Array4<f32>,
        expected_shape: (usize, usize, usize, usize),
    ) -> Result<()> {
        let actual = tensor.dim();
        if actual != expected_shape {
            let (batch, channels, height, width) = expected_shape;
            return Err(CutoutError::invalid_tensor(format!(
                "Tensor shape mismatch. Expected [{}, {}, {}, {}], got [{}, {}, {}, {}]",
                batch, channels, height, width, actual.0, actual.1, actual.2, actual.3
            )));
        }
        Ok(())
    }

    /// Validate image dimensions are within reasonable bounds
    pub fn validate_image_dimensions(size: Size<Original>) -> Result<()> {
        const MAX_DIMENSION: u32 = 16384;

        if size.is_empty() {
            return Err(CutoutError::invalid_config(format!(
                "Image dimensions too small: {}",
                size
            )));
        }
        if size.width > MAX_DIMENSION || size.height > MAX_DIMENSION {
            return Err(CutoutError::invalid_config(format!(
                "Image dimensions too large: {}. Maximum: {}x{}",
                size, MAX_DIMENSION, MAX_DIMENSION
            )));
        }
        Ok(())
    }

    /// Validate decoder output: one `mask_size` x `mask_size` plane per score
    ///
    /// Returns the candidate count.
    pub fn validate_candidate_masks(
        scores: &[f32],
        masks: &[f32],
        mask_size: usize,
    ) -> Result<usize> {
        let candidates = scores.len();
        if candidates == 0 {
            return Err(CutoutError::invalid_tensor("decoder returned no scores"));
        }
        let plane = mask_size * mask_size;
        let expected = candidates * plane;
        if masks.len() != expected {
            return Err(CutoutError::invalid_tensor(format!(
                "Mask buffer holds {} values, expected {} ({} x {}x{})",
                masks.len(),
                expected,
                candidates,
                mask_size,
                mask_size
            )));
        }
        Ok(candidates)
    }

    /// Validate a single square mask buffer
    pub fn validate_square_mask(mask: &[f32], mask_size: usize) -> Result<()> {
        let expected = mask_size * mask_size;
        if mask.len() != expected {
            return Err(CutoutError::invalid_tensor(format!(
                "Mask buffer holds {} values, expected {} for {}x{}",
                mask.len(),
                expected,
                mask_size,
                mask_size
            )));
        }
        Ok(())
    }

    /// Validate that a tensor holds no NaN or infinite values
    pub fn validate_finite(values: &[f32]) -> Result<()> {
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(CutoutError::invalid_tensor(format!(
                "Tensor contains a non-finite value at index {}",
                index
            )));
        }
        Ok(())
    }
}
