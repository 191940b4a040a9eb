//! Per-variant pipeline configuration
//!
//! The segmentation and background-removal pipelines share the same
//! resize/normalize/morphology primitives and differ only in the constants
//! recorded here.

use crate::error::{CutoutError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which model family a configuration targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineVariant {
    /// Interactive point-prompted segmentation (1024 input, 4 candidates)
    SegmentAnything,
    /// Single-mask salient object removal (320 input)
    BackgroundRemoval,
}

impl std::fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SegmentAnything => write!(f, "segment-anything"),
            Self::BackgroundRemoval => write!(f, "background-removal"),
        }
    }
}

/// How 8-bit pixel values are scaled before mean/std normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PixelScaling {
    /// Use values as-is in [0, 255]
    Raw,
    /// Divide by the resized image's own maximum value, giving [0, 1]
    MaxValue,
}

/// Channel order of the tensor planes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Source RGB channel index that feeds tensor plane `plane`
    #[must_use]
    pub const fn source_channel(self, plane: usize) -> usize {
        match self {
            Self::Rgb => plane,
            Self::Bgr => 2 - plane,
        }
    }
}

/// Structuring element shapes, built the way OpenCV builds them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelShape {
    Rect,
    Cross,
    Ellipse,
}

/// Dilate-then-erode smoothing step of the segmentation cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DilateErodeConfig {
    pub dilate_shape: KernelShape,
    pub erode_shape: KernelShape,
    pub kernel_size: u32,
    pub iterations: u32,
}

/// Morphological cleanup applied to the selected mask.
///
/// Steps always run in the order open, blur, dilate, erode, rethreshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupConfig {
    pub open_shape: KernelShape,
    pub open_size: u32,
    pub blur_size: u32,
    pub blur_sigma: f32,
    /// `None` skips the dilate/erode step
    pub dilate_erode: Option<DilateErodeConfig>,
    /// Pixels strictly above this value (of 255) survive the final pass
    pub final_threshold: u8,
}

impl CleanupConfig {
    /// Cleanup used on the interactive segmentation mask
    #[must_use]
    pub fn segment_anything() -> Self {
        Self {
            open_shape: KernelShape::Ellipse,
            open_size: 3,
            blur_size: 5,
            blur_sigma: 2.0,
            // Built from the erode/dilate operation codes, which OpenCV
            // reads as RECT (0) and CROSS (1).
            dilate_erode: Some(DilateErodeConfig {
                dilate_shape: KernelShape::Cross,
                erode_shape: KernelShape::Rect,
                kernel_size: 5,
                iterations: 3,
            }),
            final_threshold: 75,
        }
    }

    /// Cleanup used on the background-removal mask
    #[must_use]
    pub fn background_removal() -> Self {
        Self {
            dilate_erode: None,
            ..Self::segment_anything()
        }
    }
}

/// Configuration for one pipeline variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub variant: PipelineVariant,
    /// Edge length S of the padded square model input
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub pixel_scaling: PixelScaling,
    pub channel_order: ChannelOrder,
    /// Edge length of the decoder's low-resolution masks
    pub low_res_mask_size: u32,
    /// Logits strictly above this value are foreground
    pub mask_threshold: f32,
    /// Minimum foreground pixel count at model resolution (confidence gate)
    pub area_threshold: Option<usize>,
    pub cleanup: CleanupConfig,
}

impl PipelineConfig {
    /// Preset for the interactive segmentation model
    #[must_use]
    pub fn segment_anything() -> Self {
        Self {
            variant: PipelineVariant::SegmentAnything,
            input_size: 1024,
            mean: [123.675, 116.28, 103.53],
            std: [58.395, 57.12, 57.375],
            pixel_scaling: PixelScaling::Raw,
            channel_order: ChannelOrder::Bgr,
            low_res_mask_size: 256,
            mask_threshold: 0.0,
            area_threshold: None,
            cleanup: CleanupConfig::segment_anything(),
        }
    }

    /// Preset for the background-removal model
    #[must_use]
    pub fn background_removal() -> Self {
        Self {
            variant: PipelineVariant::BackgroundRemoval,
            input_size: 320,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            pixel_scaling: PixelScaling::MaxValue,
            channel_order: ChannelOrder::Bgr,
            low_res_mask_size: 320,
            mask_threshold: 0.0,
            // 5% of the 320x320 working area
            area_threshold: Some(5120),
            cleanup: CleanupConfig::background_removal(),
        }
    }

    /// Preset for a variant
    #[must_use]
    pub fn for_variant(variant: PipelineVariant) -> Self {
        match variant {
            PipelineVariant::SegmentAnything => Self::segment_anything(),
            PipelineVariant::BackgroundRemoval => Self::background_removal(),
        }
    }

    #[must_use]
    pub fn builder(variant: PipelineVariant) -> PipelineConfigBuilder {
        PipelineConfigBuilder::new(variant)
    }

    /// Validate configuration values
    ///
    /// # Errors
    /// - Zero input or mask size
    /// - Zero or non-finite std entries
    /// - Even or zero kernel sizes
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(CutoutError::invalid_config("input size must be positive"));
        }
        if self.low_res_mask_size == 0 {
            return Err(CutoutError::invalid_config(
                "low-resolution mask size must be positive",
            ));
        }
        if let Some(channel) = self.std.iter().position(|s| *s == 0.0 || !s.is_finite()) {
            return Err(CutoutError::invalid_config(format!(
                "std for channel {} must be finite and non-zero, got {}",
                channel,
                self.std.get(channel).copied().unwrap_or_default()
            )));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(CutoutError::invalid_config("mean values must be finite"));
        }

        let cleanup = &self.cleanup;
        Self::validate_kernel("open", cleanup.open_size)?;
        Self::validate_kernel("blur", cleanup.blur_size)?;
        if cleanup.blur_sigma <= 0.0 || !cleanup.blur_sigma.is_finite() {
            return Err(CutoutError::invalid_config(format!(
                "blur sigma must be positive, got {}",
                cleanup.blur_sigma
            )));
        }
        if let Some(step) = &cleanup.dilate_erode {
            Self::validate_kernel("dilate/erode", step.kernel_size)?;
        }
        Ok(())
    }

    fn validate_kernel(name: &str, size: u32) -> Result<()> {
        // imageproc masks are limited to 511 pixels per side
        if size == 0 || size % 2 == 0 || size > 511 {
            return Err(CutoutError::invalid_config(format!(
                "{} kernel size must be odd and in 1..=511, got {}",
                name, size
            )));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CutoutError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            CutoutError::invalid_config(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CutoutError::processing(format!("failed to serialize config: {}", e)))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::segment_anything()
    }
}

/// Builder for `PipelineConfig`
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn new(variant: PipelineVariant) -> Self {
        Self {
            config: PipelineConfig::for_variant(variant),
        }
    }

    #[must_use]
    pub fn input_size(mut self, size: u32) -> Self {
        self.config.input_size = size;
        self
    }

    #[must_use]
    pub fn normalization(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.config.mean = mean;
        self.config.std = std;
        self
    }

    #[must_use]
    pub fn pixel_scaling(mut self, scaling: PixelScaling) -> Self {
        self.config.pixel_scaling = scaling;
        self
    }

    #[must_use]
    pub fn channel_order(mut self, order: ChannelOrder) -> Self {
        self.config.channel_order = order;
        self
    }

    #[must_use]
    pub fn low_res_mask_size(mut self, size: u32) -> Self {
        self.config.low_res_mask_size = size;
        self
    }

    #[must_use]
    pub fn mask_threshold(mut self, threshold: f32) -> Self {
        self.config.mask_threshold = threshold;
        self
    }

    #[must_use]
    pub fn area_threshold(mut self, threshold: Option<usize>) -> Self {
        self.config.area_threshold = threshold;
        self
    }

    #[must_use]
    pub fn cleanup(mut self, cleanup: CleanupConfig) -> Self {
        self.config.cleanup = cleanup;
        self
    }

    /// Build the pipeline configuration
    ///
    /// # Errors
    /// Returns `CutoutError::InvalidConfig` when validation fails
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(PipelineConfig::segment_anything().validate().is_ok());
        assert!(PipelineConfig::background_removal().validate().is_ok());
    }

    #[test]
    fn test_preset_constants() {
        let sam = PipelineConfig::segment_anything();
        assert_eq!(sam.input_size, 1024);
        assert_eq!(sam.low_res_mask_size, 256);
        assert_eq!(sam.pixel_scaling, PixelScaling::Raw);
        assert!(sam.area_threshold.is_none());
        assert_eq!(
            sam.cleanup.dilate_erode,
            Some(DilateErodeConfig {
                dilate_shape: KernelShape::Cross,
                erode_shape: KernelShape::Rect,
                kernel_size: 5,
                iterations: 3,
            })
        );
        assert_eq!(sam.cleanup.open_shape, KernelShape::Ellipse);
        assert_eq!(sam.cleanup.open_size, 3);
        assert_eq!(sam.cleanup.blur_size, 5);
        assert!((sam.cleanup.blur_sigma - 2.0).abs() < f32::EPSILON);

        let u2net = PipelineConfig::background_removal();
        assert_eq!(u2net.input_size, 320);
        assert_eq!(u2net.area_threshold, Some(5120));
        assert!(u2net.cleanup.dilate_erode.is_none());
        assert_eq!(u2net.cleanup.final_threshold, 75);
    }

    #[test]
    fn test_channel_order_mapping() {
        assert_eq!(ChannelOrder::Rgb.source_channel(0), 0);
        assert_eq!(ChannelOrder::Bgr.source_channel(0), 2);
        assert_eq!(ChannelOrder::Bgr.source_channel(1), 1);
        assert_eq!(ChannelOrder::Bgr.source_channel(2), 0);
    }

    #[test]
    fn test_builder_validation() {
        let config = PipelineConfig::builder(PipelineVariant::SegmentAnything)
            .input_size(512)
            .build()
            .unwrap();
        assert_eq!(config.input_size, 512);

        let result = PipelineConfig::builder(PipelineVariant::SegmentAnything)
            .normalization([0.0; 3], [1.0, 0.0, 1.0])
            .build();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("channel 1"));

        let result = PipelineConfig::builder(PipelineVariant::BackgroundRemoval)
            .input_size(0)
            .build();
        assert!(result.is_err());

        let mut cleanup = CleanupConfig::segment_anything();
        cleanup.blur_size = 4;
        let result = PipelineConfig::builder(PipelineVariant::SegmentAnything)
            .cleanup(cleanup)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_json_round_trip_preserves_variant() {
        let config = PipelineConfig::background_removal();
        let json = config.to_json_string().unwrap();
        assert!(json.contains("\"background-removal\""));
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
