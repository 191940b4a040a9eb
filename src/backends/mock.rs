//! Mock engines for testing and benchmarking
//!
//! Output is deterministic and geometric so tests can predict which pixels
//! end up in the final mask without model files.

use crate::error::{CutoutError, Result};
use crate::inference::{ImageEncoder, MaskDecoder, SaliencyModel};
use crate::prompts::TransformedPrompts;
use crate::types::{DecoderOutput, FeatureTensor, Original, Size};
use crate::utils::validation::TensorValidator;
use ndarray::Array4;

/// Mock encoder producing block-averaged features
#[derive(Debug)]
pub struct MockEncoder {
    input_size: u32,
}

impl MockEncoder {
    #[must_use]
    pub fn new(input_size: u32) -> Self {
        Self { input_size }
    }
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl ImageEncoder for MockEncoder {
    fn encode(&mut self, input: &Array4<f32>) -> Result<FeatureTensor> {
        let edge = self.input_size as usize;
        TensorValidator::validate_tensor_shape(input, (1, 3, edge, edge))?;

        let (_, channels, embed_h, embed_w) = FeatureTensor::SHAPE;
        let block_h = (edge / embed_h).max(1);
        let block_w = (edge / embed_w).max(1);
        let features = Array4::from_shape_fn(FeatureTensor::SHAPE, |(_, c, y, x)| {
            // Sample the block's top-left pixel of the matching colour plane
            let plane = c % 3;
            let scale = (c / 3) as f32 / channels as f32;
            input
                .get([0, plane, (y * block_h).min(edge - 1), (x * block_w).min(edge - 1)])
                .copied()
                .unwrap_or(0.0)
                * (1.0 - scale)
        });
        FeatureTensor::new(features)
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }
}

/// Mock decoder emitting discs around the first prompt point.
///
/// Candidate `k` is a disc of `radii[k]` low-resolution pixels; its logit is
/// the signed distance to the disc edge, positive inside.
#[derive(Debug)]
pub struct MockDecoder {
    input_size: u32,
    mask_size: u32,
    radii: Vec<f32>,
    scores: Vec<f32>,
}

impl MockDecoder {
    /// Four candidates with scores `[0.2, 0.9, 0.5, 0.1]`
    #[must_use]
    pub fn new(input_size: u32) -> Self {
        Self::with_candidates(input_size, 256, vec![8.0, 24.0, 48.0, 96.0], vec![0.2, 0.9, 0.5, 0.1])
    }

    #[must_use]
    pub fn with_candidates(input_size: u32, mask_size: u32, radii: Vec<f32>, scores: Vec<f32>) -> Self {
        Self {
            input_size,
            mask_size,
            radii,
            scores,
        }
    }
}

impl MaskDecoder for MockDecoder {
    fn decode(
        &mut self,
        features: &FeatureTensor,
        prompts: &TransformedPrompts,
        _original_size: Size<Original>,
    ) -> Result<DecoderOutput> {
        if self.radii.len() != self.scores.len() {
            return Err(CutoutError::invalid_config(
                "mock decoder needs one radius per score",
            ));
        }
        debug_assert_eq!(features.view().dim(), FeatureTensor::SHAPE);

        let side = self.mask_size as usize;
        let ratio = self.mask_size as f32 / self.input_size as f32;
        // First foreground point, scaled from resized space to mask space
        let centre = prompts
            .coords
            .chunks_exact(2)
            .zip(prompts.labels.iter())
            .find(|(_, label)| **label > 0.0)
            .map(|(xy, _)| (xy[0] * ratio, xy[1] * ratio));

        let mut low_res_masks = Vec::with_capacity(self.radii.len() * side * side);
        for radius in &self.radii {
            for y in 0..side {
                for x in 0..side {
                    let logit = match centre {
                        Some((cx, cy)) => {
                            let dx = x as f32 + 0.5 - cx;
                            let dy = y as f32 + 0.5 - cy;
                            radius - (dx * dx + dy * dy).sqrt()
                        },
                        None => -1.0,
                    };
                    low_res_masks.push(logit);
                }
            }
        }

        Ok(DecoderOutput {
            scores: self.scores.clone(),
            low_res_masks,
        })
    }

    fn mask_size(&self) -> u32 {
        self.mask_size
    }
}

/// Mock saliency model emitting a centred disc
#[derive(Debug)]
pub struct MockSaliencyModel {
    mask_size: u32,
    radius: f32,
}

impl MockSaliencyModel {
    #[must_use]
    pub fn new(mask_size: u32, radius: f32) -> Self {
        Self { mask_size, radius }
    }
}

impl SaliencyModel for MockSaliencyModel {
    fn predict(&mut self, input: &Array4<f32>) -> Result<Vec<f32>> {
        let side = self.mask_size as usize;
        TensorValidator::validate_tensor_shape(input, (1, 3, side, side))?;

        let centre = side as f32 / 2.0;
        let mut mask = Vec::with_capacity(side * side);
        for y in 0..side {
            for x in 0..side {
                let dx = x as f32 + 0.5 - centre;
                let dy = y as f32 + 0.5 - centre;
                let inside = (dx * dx + dy * dy).sqrt() <= self.radius;
                mask.push(if inside { 0.95 } else { 0.02 });
            }
        }
        Ok(mask)
    }

    fn mask_size(&self) -> u32 {
        self.mask_size
    }
}
