//! Interactive segmentation session
//!
//! A session owns one image at a time together with everything derived from
//! it. Its lifecycle is a strict state machine:
//!
//! ```text
//! Empty -> ImageSet -> FeaturesReady -> MaskAvailable
//!   ^__________________ clear() ___________________|
//! ```
//!
//! Each phase carries exactly the buffers that are valid in it, so a mask
//! can never outlive the features it was decoded from.

use crate::{
    compositor::{Compositor, Sticker},
    config::PipelineConfig,
    error::{CutoutError, Result},
    inference::{ImageEncoder, MaskDecoder},
    postprocessing::MaskPostprocessor,
    prompts::{PromptLabel, PromptPoint, PromptState, TransformedPrompts},
    services::ImageIOService,
    types::{BinaryMask, FeatureTensor, Original, Resized, Size},
    utils::{ImagePreprocessor, NormalizedTensor, ResizeLongestSide},
};
use image::RgbImage;
use instant::Instant;
use std::path::Path;
use tracing::{debug, info, span, Level};

/// Observable lifecycle phase of a [`SegmentSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Empty,
    ImageSet,
    FeaturesReady,
    MaskAvailable,
}

impl SessionPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::ImageSet => "image-set",
            Self::FeaturesReady => "features-ready",
            Self::MaskAvailable => "mask-available",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The source image and its size bookkeeping
#[derive(Debug, Clone)]
struct ImageContext {
    image: RgbImage,
    original_size: Size<Original>,
    resized_size: Size<Resized>,
}

#[derive(Debug, Default)]
enum Stage {
    #[default]
    Empty,
    ImageSet(ImageContext),
    FeaturesReady {
        context: ImageContext,
        features: FeatureTensor,
    },
    MaskAvailable {
        context: ImageContext,
        features: FeatureTensor,
        mask: BinaryMask,
    },
}

impl Stage {
    fn phase(&self) -> SessionPhase {
        match self {
            Self::Empty => SessionPhase::Empty,
            Self::ImageSet(_) => SessionPhase::ImageSet,
            Self::FeaturesReady { .. } => SessionPhase::FeaturesReady,
            Self::MaskAvailable { .. } => SessionPhase::MaskAvailable,
        }
    }

    fn context(&self) -> Option<&ImageContext> {
        match self {
            Self::Empty => None,
            Self::ImageSet(context)
            | Self::FeaturesReady { context, .. }
            | Self::MaskAvailable { context, .. } => Some(context),
        }
    }

    fn features(&self) -> Option<&FeatureTensor> {
        match self {
            Self::FeaturesReady { features, .. } | Self::MaskAvailable { features, .. } => {
                Some(features)
            },
            _ => None,
        }
    }
}

/// Per-image working set for interactive point-prompted segmentation
#[derive(Debug)]
pub struct SegmentSession {
    config: PipelineConfig,
    resizer: ResizeLongestSide,
    postprocessor: MaskPostprocessor,
    stage: Stage,
    prompts: PromptState,
}

impl SegmentSession {
    /// Create an empty session for the given pipeline configuration
    ///
    /// # Errors
    /// Returns `CutoutError::InvalidConfig` when validation fails
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            resizer: ResizeLongestSide::new(config.input_size),
            postprocessor: MaskPostprocessor::new(config.clone()),
            config,
            stage: Stage::Empty,
            prompts: PromptState::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.stage.phase()
    }

    fn require_context(&self, operation: &'static str) -> Result<&ImageContext> {
        self.stage
            .context()
            .ok_or_else(|| CutoutError::invalid_state(operation, self.phase().as_str()))
    }

    /// Load an image file and prepare its model-input tensor.
    ///
    /// Valid in any phase; the session is reset first.
    pub fn preprocess<P: AsRef<Path>>(&mut self, path: P) -> Result<NormalizedTensor> {
        self.clear();
        let image = ImageIOService::load_rgb(path)?;
        self.preprocess_image(image)
    }

    /// Prepare the model-input tensor for an in-memory image.
    ///
    /// Valid in any phase; the session is reset first.
    pub fn preprocess_image(&mut self, image: RgbImage) -> Result<NormalizedTensor> {
        self.clear();
        let _span = span!(Level::DEBUG, "preprocessing").entered();
        let start = Instant::now();

        let tensor = ImagePreprocessor::preprocess(&image, &self.config)?;
        self.stage = Stage::ImageSet(ImageContext {
            image,
            original_size: tensor.original_size(),
            resized_size: tensor.resized_size(),
        });

        info!(
            original = %tensor.original_size(),
            resized = %tensor.resized_size(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Image set"
        );
        Ok(tensor)
    }

    /// Cache the encoder embedding for the current image.
    ///
    /// Replacing features discards any mask decoded from the old ones.
    pub fn set_features(&mut self, features: FeatureTensor) -> Result<()> {
        let context = match std::mem::take(&mut self.stage) {
            Stage::Empty => {
                return Err(CutoutError::invalid_state(
                    "set features",
                    SessionPhase::Empty.as_str(),
                ))
            },
            Stage::ImageSet(context)
            | Stage::FeaturesReady { context, .. }
            | Stage::MaskAvailable { context, .. } => context,
        };
        self.stage = Stage::FeaturesReady { context, features };
        info!("Features cached, ready for prompts");
        Ok(())
    }

    /// Add a prompt in original-image coordinates
    pub fn add_prompt(&mut self, point: PromptPoint, label: PromptLabel) -> Result<()> {
        self.require_context("add a prompt")?;
        self.prompts.add(point, label)?;
        debug!(x = point.x, y = point.y, label = label.value(), total = self.prompts.len(), "Prompt added");
        Ok(())
    }

    /// Undo the most recent prompt
    pub fn pop_prompt(&mut self) -> Result<(PromptPoint, PromptLabel)> {
        self.require_context("remove a prompt")?;
        let removed = self.prompts.pop()?;
        debug!(total = self.prompts.len(), "Prompt removed");
        Ok(removed)
    }

    /// Stored prompts in original-image space, in insertion order
    #[must_use]
    pub fn get_prompts(&self) -> (&[PromptPoint], &[PromptLabel]) {
        (self.prompts.points(), self.prompts.labels())
    }

    #[must_use]
    pub fn count_prompts(&self) -> usize {
        self.prompts.len()
    }

    /// Decoder-ready prompt coordinates and labels
    pub fn transform_prompts(&self) -> Result<TransformedPrompts> {
        let context = self.require_context("transform prompts")?;
        self.prompts.transform(&self.resizer, context.original_size)
    }

    /// Turn decoder output into the session mask
    pub fn postprocess(&mut self, scores: &[f32], low_res_masks: &[f32]) -> Result<()> {
        let (context, features) = match std::mem::take(&mut self.stage) {
            Stage::FeaturesReady { context, features }
            | Stage::MaskAvailable {
                context, features, ..
            } => (context, features),
            other => {
                let phase = other.phase();
                self.stage = other;
                return Err(CutoutError::invalid_state("postprocess", phase.as_str()));
            },
        };

        match self.postprocessor.process_candidates(
            scores,
            low_res_masks,
            context.resized_size,
            context.original_size,
        ) {
            Ok(mask) => {
                info!(foreground = mask.foreground_pixels(), "Mask available");
                self.stage = Stage::MaskAvailable {
                    context,
                    features,
                    mask,
                };
                Ok(())
            },
            Err(e) => {
                // Keep the phase we came from
                self.stage = Stage::FeaturesReady { context, features };
                Err(e)
            },
        }
    }

    /// Current mask
    pub fn mask(&self) -> Result<&BinaryMask> {
        match &self.stage {
            Stage::MaskAvailable { mask, .. } => Ok(mask),
            other => Err(CutoutError::invalid_state("read the mask", other.phase().as_str())),
        }
    }

    /// Write the current mask as a grayscale PNG
    pub fn write_mask<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mask = self.mask()?;
        ImageIOService::save_gray_png(mask.as_image(), path)
    }

    /// Cut-out of the current mask, `None` if the mask is empty
    pub fn sticker(&self) -> Result<Option<Sticker>> {
        match &self.stage {
            Stage::MaskAvailable { context, mask, .. } => Compositor::compose(&context.image, mask),
            other => Err(CutoutError::invalid_state(
                "build a sticker",
                other.phase().as_str(),
            )),
        }
    }

    /// Write the cut-out; returns whether a file was produced
    pub fn write_sticker<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        match self.sticker()? {
            Some(sticker) => {
                sticker.save(path)?;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// True once features are cached for the current image, i.e. prompts
    /// can be decoded. A preprocessed image alone does not count.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.stage.features().is_some()
    }

    #[must_use]
    pub fn features(&self) -> Option<&FeatureTensor> {
        self.stage.features()
    }

    #[must_use]
    pub fn original_size(&self) -> Option<Size<Original>> {
        self.stage.context().map(|c| c.original_size)
    }

    #[must_use]
    pub fn resized_size(&self) -> Option<Size<Resized>> {
        self.stage.context().map(|c| c.resized_size)
    }

    /// Release every buffer and return to `Empty`
    pub fn clear(&mut self) {
        if self.phase() != SessionPhase::Empty {
            debug!(phase = %self.phase(), "Clearing session");
        }
        self.stage = Stage::Empty;
        self.prompts.clear();
    }

    /// Run an encoder on a preprocessed tensor and cache the result
    pub fn encode_with<E: ImageEncoder + ?Sized>(
        &mut self,
        encoder: &mut E,
        input: &NormalizedTensor,
    ) -> Result<()> {
        self.require_context("encode")?;
        if encoder.input_size() != self.config.input_size {
            return Err(CutoutError::invalid_config(format!(
                "encoder expects {} input, session uses {}",
                encoder.input_size(),
                self.config.input_size
            )));
        }
        let _span = span!(Level::INFO, "encode").entered();
        let start = Instant::now();
        let features = encoder.encode(input.tensor())?;
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Encoder finished");
        self.set_features(features)
    }

    /// Decode the current prompts with `decoder` and postprocess the result
    pub fn decode_with<D: MaskDecoder + ?Sized>(&mut self, decoder: &mut D) -> Result<()> {
        if decoder.mask_size() != self.config.low_res_mask_size {
            return Err(CutoutError::invalid_config(format!(
                "decoder emits {}x{} masks, session expects {}x{}",
                decoder.mask_size(),
                decoder.mask_size(),
                self.config.low_res_mask_size,
                self.config.low_res_mask_size
            )));
        }
        let prompts = self.transform_prompts()?;
        let (features, original_size) = match (self.stage.features(), self.original_size()) {
            (Some(features), Some(size)) => (features, size),
            _ => return Err(CutoutError::invalid_state("decode", self.phase().as_str())),
        };

        let output = {
            let _span = span!(Level::INFO, "decode", prompts = prompts.num_points()).entered();
            let start = Instant::now();
            let output = decoder.decode(features, &prompts, original_size)?;
            debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Decoder finished");
            output
        };
        self.postprocess(&output.scores, &output.low_res_masks)
    }
}

impl Default for SegmentSession {
    fn default() -> Self {
        let config = PipelineConfig::segment_anything();
        Self {
            resizer: ResizeLongestSide::new(config.input_size),
            postprocessor: MaskPostprocessor::new(config.clone()),
            config,
            stage: Stage::Empty,
            prompts: PromptState::new(),
        }
    }
}
