//! Inference engine seams
//!
//! The pipeline never runs a model itself. These traits describe what an
//! external engine must provide so a session can drive it end to end.

use crate::{
    error::Result,
    prompts::TransformedPrompts,
    types::{DecoderOutput, FeatureTensor, Original, Size},
};
use ndarray::Array4;

/// Encoder stage: normalized image tensor to cached embedding
pub trait ImageEncoder {
    /// Encode a (1, 3, S, S) tensor
    ///
    /// # Errors
    /// - Engine failures
    /// - Input tensor of unexpected shape
    fn encode(&mut self, input: &Array4<f32>) -> Result<FeatureTensor>;

    /// Square edge length the encoder expects
    fn input_size(&self) -> u32;
}

/// Decoder stage: embedding plus prompts to scored candidate masks
pub trait MaskDecoder {
    /// Decode candidate masks for the given prompts
    ///
    /// # Errors
    /// - Engine failures
    /// - Prompt tensors of unexpected shape
    fn decode(
        &mut self,
        features: &FeatureTensor,
        prompts: &TransformedPrompts,
        original_size: Size<Original>,
    ) -> Result<DecoderOutput>;

    /// Edge length of each low-resolution candidate mask
    fn mask_size(&self) -> u32;
}

/// Single-pass salient object model used for background removal
pub trait SaliencyModel {
    /// Predict one `mask_size` x `mask_size` saliency map, row-major
    ///
    /// # Errors
    /// - Engine failures
    /// - Input tensor of unexpected shape
    fn predict(&mut self, input: &Array4<f32>) -> Result<Vec<f32>>;

    fn mask_size(&self) -> u32;
}
