//! Error types for segmentation pre/post-processing operations

use thiserror::Error;

/// Result type alias for cutout operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Error types for the cutout pipeline
///
/// Every failure is recoverable by the caller: state violations are fixed by
/// issuing the missing step first, empty results simply mean there is nothing
/// to write.
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Operation invoked before its prerequisite session phase
    #[error("Invalid state: cannot {operation} while session is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },

    /// Prompt point and label sequences diverged in length
    #[error("Prompt sequences out of sync: {points} points vs {labels} labels")]
    PromptMismatch { points: usize, labels: usize },

    /// Pop requested with no stored prompts
    #[error("No prompts to remove")]
    EmptyPrompts,

    /// Nothing to crop or write (empty mask)
    #[error("No content: {0}")]
    NoContent(String),

    /// Background-removal confidence gate rejected the mask
    #[error("No object detected: {foreground} foreground pixels below threshold {threshold}")]
    BelowAreaThreshold { foreground: usize, threshold: usize },

    /// Externally supplied tensor has the wrong shape or length
    #[error("Invalid tensor: {0}")]
    InvalidTensor(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Processing error: {0}")]
    Processing(String),
}

impl CutoutError {
    /// Create a new state violation error
    #[must_use]
    pub fn invalid_state(operation: &'static str, phase: &'static str) -> Self {
        Self::InvalidState { operation, phase }
    }

    /// Create a new no-content error
    pub fn no_content<S: Into<String>>(msg: S) -> Self {
        Self::NoContent(msg.into())
    }

    /// Create a new invalid tensor error
    pub fn invalid_tensor<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTensor(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create image loading error with format context
    pub fn image_load_error<P: AsRef<std::path::Path>>(
        path: P,
        error: &image::ImageError,
    ) -> Self {
        let path_display = path.as_ref().display();
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");

        Self::Image(image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "Failed to load image '{}' (format: {}): {}",
                path_display, extension, error
            ),
        )))
    }

    /// True for errors caused by calling an operation out of order
    #[must_use]
    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. } | Self::PromptMismatch { .. } | Self::EmptyPrompts
        )
    }

    /// True for "nothing to produce" outcomes (empty mask, rejected mask)
    #[must_use]
    pub fn is_no_content(&self) -> bool {
        matches!(self, Self::NoContent(_) | Self::BelowAreaThreshold { .. })
    }
}
