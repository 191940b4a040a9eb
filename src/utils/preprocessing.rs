//! Image to model-input tensor conversion
//!
//! Both pipeline variants go through the same steps: longest-side resize,
//! channel-first transpose, mean/std normalization, bottom/right zero
//! padding to a square and a leading batch dimension. Only the constants in
//! [`PipelineConfig`] differ.

use crate::{
    config::{PipelineConfig, PixelScaling},
    error::{CutoutError, Result},
    types::{ModelInput, Original, Resized, Size},
    utils::{resize::ResizeLongestSide, validation::TensorValidator},
};
use image::RgbImage;
use ndarray::{s, Array3, Array4};

/// Model-input tensor plus the size bookkeeping needed to map results back
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    tensor: Array4<f32>,
    original_size: Size<Original>,
    resized_size: Size<Resized>,
}

impl NormalizedTensor {
    /// Tensor in (1, 3, S, S) layout
    #[must_use]
    pub fn tensor(&self) -> &Array4<f32> {
        &self.tensor
    }

    #[must_use]
    pub fn into_tensor(self) -> Array4<f32> {
        self.tensor
    }

    /// Size of the source image before resizing
    #[must_use]
    pub fn original_size(&self) -> Size<Original> {
        self.original_size
    }

    /// Size of the resized content before padding
    #[must_use]
    pub fn resized_size(&self) -> Size<Resized> {
        self.resized_size
    }

    /// Padded square extent
    #[must_use]
    pub fn input_size(&self) -> Size<ModelInput> {
        let (_, _, height, width) = self.tensor.dim();
        Size::new(height as u32, width as u32)
    }

    #[must_use]
    pub fn shape(&self) -> [usize; 4] {
        let (batch, channels, height, width) = self.tensor.dim();
        [batch, channels, height, width]
    }

    /// Row-major flattened copy of the tensor
    #[must_use]
    pub fn to_vec(&self) -> Vec<f32> {
        self.tensor.iter().copied().collect()
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an RGB image into a normalized, padded (1, 3, S, S) tensor
    ///
    /// # Errors
    /// - Empty or oversized images
    /// - Images so thin that one side resizes to zero pixels
    /// - Resized content that does not fit the configured square
    pub fn preprocess(image: &RgbImage, config: &PipelineConfig) -> Result<NormalizedTensor> {
        let original_size = Size::from_dimensions(image.dimensions());
        TensorValidator::validate_image_dimensions(original_size)?;

        let resizer = ResizeLongestSide::new(config.input_size);
        let resized_size = resizer.target_size(original_size);
        if resized_size.is_empty() {
            return Err(CutoutError::invalid_config(format!(
                "Image {} collapses to {} at input size {}",
                original_size, resized_size, config.input_size
            )));
        }
        let resized = resizer.apply_image(image);

        let planes = Self::to_channel_first(&resized, config);
        let normalized = Self::normalize(planes, config);
        let padded = Self::pad_bottom_right(&normalized, config.input_size)?;
        let tensor = Self::add_batch_dim(padded);

        tracing::debug!(
            original = %original_size,
            resized = %resized_size,
            input_size = config.input_size,
            "Image preprocessed"
        );

        Ok(NormalizedTensor {
            tensor,
            original_size,
            resized_size,
        })
    }

    /// Transpose interleaved HWC pixels into CHW float planes.
    ///
    /// Planes follow the configured channel order and are scaled per
    /// [`PixelScaling`].
    #[must_use]
    pub fn to_channel_first(image: &RgbImage, config: &PipelineConfig) -> Array3<f32> {
        let (width, height) = image.dimensions();
        let divisor = match config.pixel_scaling {
            PixelScaling::Raw => 1.0,
            PixelScaling::MaxValue => {
                let max = image.as_raw().iter().copied().max().unwrap_or(0);
                if max == 0 {
                    1.0
                } else {
                    f32::from(max)
                }
            },
        };

        let order = config.channel_order;
        Array3::from_shape_fn((3, height as usize, width as usize), |(plane, y, x)| {
            let pixel = image.get_pixel(x as u32, y as u32);
            let value = pixel.0.get(order.source_channel(plane)).copied().unwrap_or(0);
            f32::from(value) / divisor
        })
    }

    /// Subtract the per-plane mean and divide by the per-plane std
    #[must_use]
    pub fn normalize(mut planes: Array3<f32>, config: &PipelineConfig) -> Array3<f32> {
        for (plane, mut channel) in planes.outer_iter_mut().enumerate() {
            let mean = config.mean.get(plane).copied().unwrap_or(0.0);
            let std = config.std.get(plane).copied().unwrap_or(1.0);
            channel.mapv_inplace(|v| (v - mean) / std);
        }
        planes
    }

    /// Zero-pad on the bottom and right so the planes become `size` x `size`
    ///
    /// # Errors
    /// Returns `CutoutError::InvalidTensor` when the content exceeds `size`
    pub fn pad_bottom_right(planes: &Array3<f32>, size: u32) -> Result<Array3<f32>> {
        let (channels, height, width) = planes.dim();
        let edge = size as usize;
        if height > edge || width > edge {
            return Err(CutoutError::invalid_tensor(format!(
                "Content {}x{} does not fit into {}x{} input",
                width, height, edge, edge
            )));
        }

        let mut padded = Array3::<f32>::zeros((channels, edge, edge));
        padded.slice_mut(s![.., ..height, ..width]).assign(planes);
        Ok(padded)
    }

    /// Prepend a batch dimension of 1
    #[must_use]
    pub fn add_batch_dim(planes: Array3<f32>) -> Array4<f32> {
        planes.insert_axis(ndarray::Axis(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelOrder;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 200])
        })
    }

    #[test]
    fn test_end_to_end_shape_and_extent() {
        let config = PipelineConfig::segment_anything();
        let image = RgbImage::from_pixel(2000, 1000, image::Rgb([255, 255, 255]));
        let result = ImagePreprocessor::preprocess(&image, &config).unwrap();

        assert_eq!(result.shape(), [1, 3, 1024, 1024]);
        assert_eq!(result.original_size(), Size::new(1000, 2000));
        assert_eq!(result.resized_size(), Size::new(512, 1024));

        let tensor = result.tensor();
        for c in 0..3 {
            // White normalizes to a strictly positive value in every plane
            assert!(tensor[[0, c, 0, 0]] > 0.0);
            assert!(tensor[[0, c, 511, 1023]] > 0.0);
            assert_eq!(tensor[[0, c, 512, 0]], 0.0);
            assert_eq!(tensor[[0, c, 1023, 1023]], 0.0);
        }
        let padded_rows = tensor.slice(s![.., .., 512.., ..]);
        assert!(padded_rows.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_padding_is_bottom_right_only() {
        let config = PipelineConfig::builder(crate::config::PipelineVariant::SegmentAnything)
            .input_size(32)
            .build()
            .unwrap();
        let image = gradient_image(16, 32);
        let result = ImagePreprocessor::preprocess(&image, &config).unwrap();

        assert_eq!(result.resized_size(), Size::new(32, 16));
        let tensor = result.tensor();
        // Content is flush with the top-left corner
        let expected = (200.0 - config.mean[0]) / config.std[0];
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-5);
        assert!(tensor.slice(s![.., .., .., 16..]).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_square_input_needs_no_padding() {
        let config = PipelineConfig::background_removal();
        let image = gradient_image(320, 320);
        let result = ImagePreprocessor::preprocess(&image, &config).unwrap();
        assert_eq!(result.shape(), [1, 3, 320, 320]);
        assert_eq!(result.resized_size(), Size::new(320, 320));
    }

    #[test]
    fn test_channel_order_and_raw_scaling() {
        let config = PipelineConfig::segment_anything();
        let image = RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let planes = ImagePreprocessor::to_channel_first(&image, &config);
        // BGR planes
        assert_eq!(planes[[0, 0, 0]], 30.0);
        assert_eq!(planes[[1, 0, 0]], 20.0);
        assert_eq!(planes[[2, 1, 1]], 10.0);

        let mut rgb = config.clone();
        rgb.channel_order = ChannelOrder::Rgb;
        let planes = ImagePreprocessor::to_channel_first(&image, &rgb);
        assert_eq!(planes[[0, 0, 0]], 10.0);
    }

    #[test]
    fn test_max_value_scaling() {
        let config = PipelineConfig::background_removal();
        let image = RgbImage::from_pixel(2, 2, image::Rgb([50, 100, 200]));
        let planes = ImagePreprocessor::to_channel_first(&image, &config);
        assert!((planes[[0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((planes[[2, 0, 0]] - 0.25).abs() < 1e-6);

        let black = RgbImage::new(2, 2);
        let planes = ImagePreprocessor::to_channel_first(&black, &config);
        assert!(planes.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_pad_rejects_oversized_content() {
        let planes = Array3::<f32>::zeros((3, 10, 40));
        assert!(ImagePreprocessor::pad_bottom_right(&planes, 32).is_err());
    }

    #[test]
    fn test_degenerate_aspect_ratio_is_rejected() {
        let config = PipelineConfig::segment_anything();
        // 1 * 1024 / 3000 rounds to a zero-height resize
        let result = ImagePreprocessor::preprocess(&RgbImage::new(3000, 1), &config);
        assert!(matches!(result, Err(CutoutError::InvalidConfig(_))));

        // 2048:1 still keeps one row
        let result = ImagePreprocessor::preprocess(&RgbImage::new(2048, 1), &config).unwrap();
        assert_eq!(result.resized_size(), Size::new(1, 1024));
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let config = PipelineConfig::segment_anything();
        assert!(ImagePreprocessor::preprocess(&RgbImage::new(0, 0), &config).is_err());
    }
}
