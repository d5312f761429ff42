//! Error types for padi-eye

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Model inference error: {0}")]
    ModelInference(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, VisionError>;

impl From<sled::Error> for VisionError {
    fn from(err: sled::Error) -> Self {
        VisionError::Persistence(format!("sled: {}", err))
    }
}

impl From<bincode::Error> for VisionError {
    fn from(err: bincode::Error) -> Self {
        VisionError::Persistence(format!("record encoding: {}", err))
    }
}

#[cfg(feature = "video")]
impl From<opencv::Error> for VisionError {
    fn from(err: opencv::Error) -> Self {
        VisionError::SourceUnavailable(err.message)
    }
}
