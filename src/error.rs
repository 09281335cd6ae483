use burn::record::RecorderError;
use std::path::PathBuf;

/// Errors raised by the digit recognizer.
#[derive(thiserror::Error, Debug)]
pub enum DigitError {
    /// The raw bytes are not an image we can decode.
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// A tensor fed to the network does not have the `[_, 1, 28, 28]` layout.
    #[error("Shape mismatch: expected [N, {expected:?}], got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Inference was requested before any checkpoint was written.
    #[error("Missing checkpoint: {}", .0.display())]
    MissingCheckpoint(PathBuf),

    /// The checkpoint was produced by a different network architecture.
    #[error("Architecture mismatch for `{parameter}`: expected {expected:?}, got {actual:?}")]
    ArchitectureMismatch {
        parameter: &'static str,
        expected: Vec<usize>,
        actual: Option<Vec<usize>>,
    },

    #[error("Recorder error: {0}")]
    Recorder(String),

    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RecorderError> for DigitError {
    fn from(error: RecorderError) -> Self {
        DigitError::Recorder(format!("{error:?}"))
    }
}

pub type Result<T> = core::result::Result<T, DigitError>;
