//! Single still image source

use super::FrameReader;
use crate::error::{Result, VisionError};
use crate::frame::{decode_frame, Frame};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Still image given either as a file or as uploaded bytes
#[derive(Debug, Clone)]
pub enum ImageInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Yields exactly one frame, decoded on first pull
pub struct ImageReader {
    input: Option<ImageInput>,
}

impl ImageReader {
    pub fn open(input: ImageInput) -> Result<Self> {
        if let ImageInput::Path(path) = &input {
            if !path.is_file() {
                return Err(VisionError::SourceUnavailable(format!(
                    "Image {:?} does not exist",
                    path
                )));
            }
        }
        Ok(Self { input: Some(input) })
    }
}

impl FrameReader for ImageReader {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = match self.input.take() {
            None => return Ok(None),
            Some(ImageInput::Bytes(bytes)) => decode_frame(&bytes)?,
            Some(ImageInput::Path(path)) => {
                let bytes = fs::read(&path).map_err(|e| {
                    VisionError::SourceUnavailable(format!("Failed to read {:?}: {}", path, e))
                })?;
                decode_frame(&bytes)?
            }
        };
        debug!("Decoded still image {}x{}", frame.width(), frame.height());
        Ok(Some(frame))
    }
}
