//! Alpha-matted cut-out ("sticker") generation

use crate::{
    error::{CutoutError, Result},
    services::ImageIOService,
    types::{BinaryMask, BoundingBox, Original, Size},
};
use image::{imageops, Rgba, RgbaImage, RgbImage};
use std::path::Path;
use tracing::{debug, span, warn, Level};

/// Cut-out cropped to the mask's bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct Sticker {
    pub image: RgbaImage,
    /// Position of the crop in original-image space
    pub bbox: BoundingBox,
}

impl Sticker {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Save as PNG (the format must carry alpha)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        ImageIOService::save_rgba_png(&self.image, path)
    }
}

/// Applies a binary mask to its source image
pub struct Compositor;

impl Compositor {
    /// Zero out background pixels, attach the mask as alpha and crop.
    ///
    /// Returns `None` for an empty mask.
    ///
    /// # Errors
    /// Returns `CutoutError::InvalidTensor` when image and mask sizes differ
    pub fn compose(image: &RgbImage, mask: &BinaryMask) -> Result<Option<Sticker>> {
        let image_size: Size<Original> = Size::from_dimensions(image.dimensions());
        if image_size != mask.size() {
            return Err(CutoutError::invalid_tensor(format!(
                "mask size {} does not match image size {}",
                mask.size(),
                image_size
            )));
        }

        let _span = span!(Level::DEBUG, "compose", size = %image_size).entered();

        let bbox = mask.bounding_box();
        if bbox.is_empty() {
            warn!("Mask is empty, nothing to cut out");
            return Ok(None);
        }

        let alpha = mask.as_image();
        let mut matted = RgbaImage::new(image.width(), image.height());
        for ((src, a), dst) in image.pixels().zip(alpha.pixels()).zip(matted.pixels_mut()) {
            let keep = a[0];
            *dst = Rgba([src[0] & keep, src[1] & keep, src[2] & keep, keep]);
        }

        let cropped = imageops::crop_imm(&matted, bbox.x, bbox.y, bbox.width, bbox.height)
            .to_image();
        debug!(
            x = bbox.x,
            y = bbox.y,
            width = bbox.width,
            height = bbox.height,
            "Sticker cropped"
        );

        Ok(Some(Sticker {
            image: cropped,
            bbox,
        }))
    }

    /// Compose and write the sticker; returns whether a file was written
    pub fn write<P: AsRef<Path>>(image: &RgbImage, mask: &BinaryMask, path: P) -> Result<bool> {
        match Self::compose(image, mask)? {
            Some(sticker) => {
                sticker.save(path)?;
                Ok(true)
            },
            None => Ok(false),
        }
    }
}
