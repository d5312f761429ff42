//! Frame sinks for terminal use

use image::ImageFormat;
use padi_eye::{Frame, FrameSink, Result};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Overwrites `latest.jpg` in a directory with every displayed frame
pub struct JpegFileSink {
    latest: PathBuf,
}

impl JpegFileSink {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            latest: dir.join("latest.jpg"),
        })
    }
}

impl FrameSink for JpegFileSink {
    fn show(&mut self, frame: &Frame, caption: &str) -> Result<()> {
        frame.save_with_format(&self.latest, ImageFormat::Jpeg)?;
        info!("{} -> {:?}", caption, self.latest);
        Ok(())
    }
}

/// Logs one line per frame
pub struct LogSink;

impl FrameSink for LogSink {
    fn show(&mut self, frame: &Frame, caption: &str) -> Result<()> {
        info!("{} ({}x{})", caption, frame.width(), frame.height());
        Ok(())
    }
}
