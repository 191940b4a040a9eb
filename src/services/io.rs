//! Image and tensor file I/O
//!
//! Keeps decoding and encoding out of the pipeline so the numeric code only
//! ever sees in-memory rasters.

use crate::{
    error::{CutoutError, Result},
    types::{BinaryMask, Original, Resized, Size},
    utils::NormalizedTensor,
};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// JSON sidecar describing a raw tensor dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorMetadata {
    pub shape: [usize; 4],
    pub dtype: String,
    pub original_height: u32,
    pub original_width: u32,
    pub resized_height: u32,
    pub resized_width: u32,
}

impl TensorMetadata {
    #[must_use]
    pub fn from_tensor(tensor: &NormalizedTensor) -> Self {
        let original = tensor.original_size();
        let resized = tensor.resized_size();
        Self {
            shape: tensor.shape(),
            dtype: "f32le".to_string(),
            original_height: original.height,
            original_width: original.width,
            resized_height: resized.height,
            resized_width: resized.width,
        }
    }

    #[must_use]
    pub fn original_size(&self) -> Size<Original> {
        Size::new(self.original_height, self.original_width)
    }

    #[must_use]
    pub fn resized_size(&self) -> Size<Resized> {
        Size::new(self.resized_height, self.resized_width)
    }
}

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Falls back to content sniffing when the extension is missing or wrong.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(CutoutError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                tracing::debug!(
                    path = %path_ref.display(),
                    error = %e,
                    "Extension-based loading failed, attempting content-based detection"
                );
                let data = std::fs::read(path_ref).map_err(|io_err| {
                    CutoutError::file_io_error("read image data", path_ref, &io_err)
                })?;
                image::load_from_memory(&data)
                    .map_err(|content_err| CutoutError::image_load_error(path_ref, &content_err))
            },
        }
    }

    /// Load an image as 8-bit RGB
    pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
        Ok(Self::load_image(path)?.to_rgb8())
    }

    /// Load a grayscale mask; any nonzero pixel counts as foreground
    pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<BinaryMask> {
        Ok(BinaryMask::from_image(Self::load_image(path)?.to_luma8()))
    }

    fn ensure_parent_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CutoutError::file_io_error("create output directory", parent, &e)
            })?;
        }
        Ok(())
    }

    /// Save an RGBA image as PNG, creating the parent directory
    pub fn save_rgba_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        Self::ensure_parent_dir(path_ref)?;
        image.save_with_format(path_ref, image::ImageFormat::Png)?;
        tracing::debug!(path = %path_ref.display(), "Saved RGBA PNG");
        Ok(())
    }

    /// Save a grayscale image as PNG, creating the parent directory
    pub fn save_gray_png<P: AsRef<Path>>(image: &GrayImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        Self::ensure_parent_dir(path_ref)?;
        image.save_with_format(path_ref, image::ImageFormat::Png)?;
        tracing::debug!(path = %path_ref.display(), "Saved grayscale PNG");
        Ok(())
    }

    /// Dump a tensor as little-endian f32 plus a `<path>.json` sidecar.
    ///
    /// Returns the sidecar path.
    pub fn write_tensor<P: AsRef<Path>>(
        tensor: &NormalizedTensor,
        path: P,
    ) -> Result<std::path::PathBuf> {
        let path_ref = path.as_ref();
        Self::ensure_parent_dir(path_ref)?;

        let file = std::fs::File::create(path_ref)
            .map_err(|e| CutoutError::file_io_error("create tensor file", path_ref, &e))?;
        let mut writer = std::io::BufWriter::new(file);
        for value in tensor.tensor() {
            writer
                .write_all(&value.to_le_bytes())
                .map_err(|e| CutoutError::file_io_error("write tensor data", path_ref, &e))?;
        }
        writer
            .flush()
            .map_err(|e| CutoutError::file_io_error("flush tensor data", path_ref, &e))?;

        let mut sidecar = path_ref.as_os_str().to_owned();
        sidecar.push(".json");
        let sidecar = std::path::PathBuf::from(sidecar);
        let metadata = serde_json::to_string_pretty(&TensorMetadata::from_tensor(tensor))
            .map_err(|e| CutoutError::processing(format!("serialize tensor metadata: {}", e)))?;
        std::fs::write(&sidecar, metadata)
            .map_err(|e| CutoutError::file_io_error("write tensor metadata", &sidecar, &e))?;

        Ok(sidecar)
    }

    /// Read a little-endian f32 buffer
    pub fn read_f32_file<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
        let path_ref = path.as_ref();
        let bytes = std::fs::read(path_ref)
            .map_err(|e| CutoutError::file_io_error("read tensor file", path_ref, &e))?;
        if bytes.len() % 4 != 0 {
            return Err(CutoutError::invalid_tensor(format!(
                "{} holds {} bytes, not a multiple of 4",
                path_ref.display(),
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(4)
            .filter_map(|chunk| <[u8; 4]>::try_from(chunk).ok().map(f32::from_le_bytes))
            .collect())
    }
}
