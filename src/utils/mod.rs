//! Shared image and tensor primitives used by both pipeline variants

pub mod morphology;
pub mod preprocessing;
pub mod resize;
pub mod validation;

pub use morphology::MaskCleanup;
pub use preprocessing::{ImagePreprocessor, NormalizedTensor};
pub use resize::{resize_bilinear, ResizeLongestSide};
pub use validation::TensorValidator;
