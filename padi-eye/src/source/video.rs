//! Stored video and webcam decoding through OpenCV

use super::FrameReader;
use crate::error::{Result, VisionError};
use crate::frame::{frame_from_rgb, Frame};
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY},
};
use std::path::Path;
use tracing::{debug, info};

/// Frame reader over an OpenCV capture (file or device)
pub struct VideoReader {
    capture: VideoCapture,
    origin: String,
}

impl VideoReader {
    /// Open a locally stored video file
    pub fn open_file(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| VisionError::SourceUnavailable(format!("Non UTF-8 path {:?}", path)))?;

        if !path.is_file() {
            return Err(VisionError::SourceUnavailable(format!("Video {:?} does not exist", path)));
        }

        let capture = VideoCapture::from_file(path_str, CAP_ANY)
            .map_err(|e| VisionError::SourceUnavailable(format!("Failed to open video {:?}: {}", path, e)))?;

        Self::from_capture(capture, format!("video {:?}", path))
    }

    /// Open a camera device by index
    pub fn open_device(index: u32) -> Result<Self> {
        let capture = VideoCapture::new(index as i32, CAP_ANY)
            .map_err(|e| VisionError::SourceUnavailable(format!("Failed to open camera {}: {}", index, e)))?;

        Self::from_capture(capture, format!("camera {}", index))
    }

    fn from_capture(capture: VideoCapture, origin: String) -> Result<Self> {
        let opened = capture
            .is_opened()
            .map_err(|e| VisionError::SourceUnavailable(format!("{} not opened: {}", origin, e)))?;

        if !opened {
            return Err(VisionError::SourceUnavailable(format!(
                "{} failed to open (missing, unsupported or in use)",
                origin
            )));
        }

        info!("Opened {}", origin);
        Ok(Self { capture, origin })
    }
}

impl FrameReader for VideoReader {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut bgr = Mat::default();
        let grabbed = self
            .capture
            .read(&mut bgr)
            .map_err(|e| VisionError::SourceUnavailable(format!("Failed to read from {}: {}", self.origin, e)))?;

        if !grabbed || bgr.empty() {
            debug!("End of stream on {}", self.origin);
            return Ok(None);
        }

        // Decoders hand out BGR; the rest of the pipeline works in RGB
        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let (width, height) = (rgb.cols(), rgb.rows());
        if width <= 0 || height <= 0 {
            return Err(VisionError::SourceUnavailable(format!(
                "{} produced an empty frame",
                self.origin
            )));
        }

        let data = rgb.data_bytes()?.to_vec();
        frame_from_rgb(width as u32, height as u32, data).map(Some)
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            debug!("Failed to release {}: {}", self.origin, e);
        }
    }
}
