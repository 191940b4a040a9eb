#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Cutout
//!
//! Image-space pre- and post-processing around interactive segmentation
//! models ("Segment Anything" style) and single-mask background removal
//! models (U²-Net style).
//!
//! The crate never runs a model. It turns photographs into the padded,
//! normalized tensors a model consumes, and turns raw scores and
//! low-resolution masks back into a cleaned full-resolution mask and an
//! alpha-matted cut-out.
//!
//! ## Features
//!
//! - **Longest-side resizing** with consistent image, mask and coordinate mapping
//! - **Typed size spaces**: original, resized and model-input sizes cannot be mixed up
//! - **Session state machine** for interactive point prompts with undo
//! - **Candidate selection** and fixed morphological cleanup of decoder output
//! - **Background removal** with an area confidence gate
//! - **CLI Integration**: optional command-line tool (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cutout::{
//!     backends::{MockDecoder, MockEncoder},
//!     PipelineConfig, PromptLabel, PromptPoint, SegmentSession,
//! };
//!
//! # fn example() -> cutout::Result<()> {
//! let mut session = SegmentSession::new(PipelineConfig::segment_anything())?;
//! let tensor = session.preprocess("photo.jpg")?;
//!
//! // Any engine implementing `ImageEncoder` / `MaskDecoder` plugs in here
//! session.encode_with(&mut MockEncoder::new(1024), &tensor)?;
//! session.add_prompt(PromptPoint::new(420, 310), PromptLabel::FOREGROUND)?;
//! session.decode_with(&mut MockDecoder::new(1024))?;
//!
//! session.write_mask("mask.png")?;
//! if !session.write_sticker("sticker.png")? {
//!     println!("mask was empty");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `tracing-json`: JSON log output for the CLI
//! - `webp-support`: WebP decoding via the `image` crate

pub mod background;
pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod inference;
pub mod postprocessing;
pub mod prompts;
pub mod services;
pub mod session;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use background::BackgroundRemover;
pub use compositor::{Compositor, Sticker};
pub use config::{
    ChannelOrder, CleanupConfig, DilateErodeConfig, KernelShape, PipelineConfig,
    PipelineConfigBuilder, PipelineVariant, PixelScaling,
};
pub use error::{CutoutError, Result};
pub use inference::{ImageEncoder, MaskDecoder, SaliencyModel};
pub use postprocessing::MaskPostprocessor;
pub use prompts::{PromptLabel, PromptPoint, PromptState, TransformedPrompts};
pub use services::{ImageIOService, TensorMetadata};
pub use session::{SegmentSession, SessionPhase};
pub use types::{
    BinaryMask, BoundingBox, DecoderOutput, FeatureTensor, ModelInput, Original, Resized, Size,
};
pub use utils::{
    resize_bilinear, ImagePreprocessor, MaskCleanup, NormalizedTensor, ResizeLongestSide,
    TensorValidator,
};

#[cfg(feature = "cli")]
pub use tracing_config::{TracingConfig, TracingFormat};
