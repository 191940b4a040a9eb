//! Single-mask background removal
//!
//! Shares the resize, normalization and morphology primitives of the
//! interactive pipeline but has no prompts and no candidate selection. A
//! mask with too little foreground is rejected instead of written.

use crate::{
    compositor::{Compositor, Sticker},
    config::PipelineConfig,
    error::{CutoutError, Result},
    inference::SaliencyModel,
    postprocessing::MaskPostprocessor,
    services::ImageIOService,
    types::{BinaryMask, Original, Resized, Size},
    utils::{ImagePreprocessor, NormalizedTensor},
};
use image::RgbImage;
use std::path::Path;
use tracing::{info, span, Level};

#[derive(Debug)]
struct LoadedImage {
    image: RgbImage,
    original_size: Size<Original>,
    resized_size: Size<Resized>,
}

/// Background remover holding at most one source image
#[derive(Debug)]
pub struct BackgroundRemover {
    config: PipelineConfig,
    postprocessor: MaskPostprocessor,
    loaded: Option<LoadedImage>,
}

impl BackgroundRemover {
    /// # Errors
    /// Returns `CutoutError::InvalidConfig` when validation fails
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            postprocessor: MaskPostprocessor::new(config.clone()),
            config,
            loaded: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn has_image(&self) -> bool {
        self.loaded.is_some()
    }

    /// Load an image file and build its (1, 3, S, S) input tensor
    pub fn preprocess<P: AsRef<Path>>(&mut self, path: P) -> Result<NormalizedTensor> {
        self.clear();
        let image = ImageIOService::load_rgb(path)?;
        self.preprocess_image(image)
    }

    /// Build the input tensor for an in-memory image, replacing any previous one
    pub fn preprocess_image(&mut self, image: RgbImage) -> Result<NormalizedTensor> {
        self.clear();
        let _span = span!(Level::DEBUG, "background_preprocessing").entered();
        let tensor = ImagePreprocessor::preprocess(&image, &self.config)?;
        self.loaded = Some(LoadedImage {
            image,
            original_size: tensor.original_size(),
            resized_size: tensor.resized_size(),
        });
        Ok(tensor)
    }

    fn loaded(&self, operation: &'static str) -> Result<&LoadedImage> {
        self.loaded
            .as_ref()
            .ok_or_else(|| CutoutError::invalid_state(operation, "empty"))
    }

    /// Gate, resize and clean up a raw saliency map
    ///
    /// # Errors
    /// - No image loaded
    /// - `CutoutError::BelowAreaThreshold` when the gate rejects the mask
    pub fn mask(&self, raw_mask: &[f32]) -> Result<BinaryMask> {
        let loaded = self.loaded("postprocess")?;
        self.postprocessor
            .process_single(raw_mask, loaded.resized_size, loaded.original_size)
    }

    /// Cut-out for a raw saliency map
    ///
    /// # Errors
    /// Same as [`Self::mask`], plus `CutoutError::NoContent` when cleanup
    /// leaves nothing
    pub fn cutout(&self, raw_mask: &[f32]) -> Result<Sticker> {
        let loaded = self.loaded("postprocess")?;
        let mask = self.mask(raw_mask)?;
        Compositor::compose(&loaded.image, &mask)?
            .ok_or_else(|| CutoutError::no_content("mask is empty after cleanup"))
    }

    /// Postprocess a raw saliency map and write the cut-out to `output_path`.
    ///
    /// Nothing is written when the mask is rejected.
    pub fn postprocess<P: AsRef<Path>>(&self, raw_mask: &[f32], output_path: P) -> Result<()> {
        let _span = span!(Level::DEBUG, "background_postprocessing").entered();
        let sticker = self.cutout(raw_mask)?;
        sticker.save(output_path.as_ref())?;
        info!(
            path = %output_path.as_ref().display(),
            width = sticker.image.width(),
            height = sticker.image.height(),
            "Background removed"
        );
        Ok(())
    }

    /// Full pass: preprocess, predict with `model`, write the cut-out
    pub fn remove_with<M, P, Q>(&mut self, model: &mut M, input: P, output: Q) -> Result<()>
    where
        M: SaliencyModel + ?Sized,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        if model.mask_size() != self.config.low_res_mask_size {
            return Err(CutoutError::invalid_config(format!(
                "model emits {}x{} masks, pipeline expects {}x{}",
                model.mask_size(),
                model.mask_size(),
                self.config.low_res_mask_size,
                self.config.low_res_mask_size
            )));
        }
        let tensor = self.preprocess(input)?;
        let raw_mask = model.predict(tensor.tensor())?;
        self.postprocess(&raw_mask, output)
    }

    /// Release the loaded image
    pub fn clear(&mut self) {
        self.loaded = None;
    }
}

impl Default for BackgroundRemover {
    fn default() -> Self {
        let config = PipelineConfig::background_removal();
        Self {
            postprocessor: MaskPostprocessor::new(config.clone()),
            config,
            loaded: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockSaliencyModel;
    use tempfile::TempDir;

    #[test]
    fn test_postprocess_requires_image() {
        let remover = BackgroundRemover::default();
        let err = remover.mask(&vec![0.0; 320 * 320]).unwrap_err();
        assert!(err.is_state_violation());
    }

    #[test]
    fn test_rejected_mask_writes_nothing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let output = temp_dir.path().join("out.png");
        let mut remover = BackgroundRemover::default();
        remover.preprocess_image(RgbImage::from_pixel(320, 320, image::Rgb([40, 80, 120])))?;

        let mut raw = vec![0.0f32; 320 * 320];
        for value in raw.iter_mut().take(5000) {
            *value = 1.0;
        }
        let err = remover.postprocess(&raw, &output).unwrap_err();
        assert!(err.is_no_content());
        assert!(!output.exists());
        Ok(())
    }

    #[test]
    fn test_remove_with_mock_model() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let input = temp_dir.path().join("input.png");
        let output = temp_dir.path().join("cutout.png");
        RgbImage::from_pixel(640, 640, image::Rgb([200, 10, 10])).save(&input)?;

        let mut remover = BackgroundRemover::default();
        let mut model = MockSaliencyModel::new(320, 100.0);
        remover.remove_with(&mut model, &input, &output)?;

        let written = image::open(&output)?.to_rgba8();
        // Disc of radius 100 at model scale becomes roughly 400 px across
        assert!(written.width() > 380 && written.width() < 420);
        let centre = written.get_pixel(written.width() / 2, written.height() / 2);
        assert_eq!(centre.0, [200, 10, 10, 255]);
        Ok(())
    }

    #[test]
    fn test_clear_releases_image() {
        let mut remover = BackgroundRemover::default();
        remover.preprocess_image(RgbImage::new(10, 10)).unwrap();
        assert!(remover.has_image());
        remover.clear();
        assert!(!remover.has_image());
    }
}
