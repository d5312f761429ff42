//! Frame sources: still images, stored video, webcams and remote video

pub mod still;
pub mod remote;
#[cfg(feature = "video")]
pub mod video;

use crate::error::{Result, VisionError};
use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::info;

pub use still::{ImageInput, ImageReader};
pub use remote::{HttpFetcher, RemoteFetcher, RoutingFetcher, YtDlpFetcher};

/// Source choices offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Image,
    Video,
    Webcam,
    YouTube,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Image,
        SourceKind::Video,
        SourceKind::Webcam,
        SourceKind::YouTube,
    ];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Image => "Image",
            SourceKind::Video => "Video",
            SourceKind::Webcam => "Webcam",
            SourceKind::YouTube => "YouTube",
        };
        f.write_str(name)
    }
}

/// Where frames come from
#[derive(Debug, Clone)]
pub enum FrameSource {
    SingleImage(ImageInput),
    StoredVideo(PathBuf),
    WebcamDevice(u32),
    RemoteVideo(String),
}

impl FrameSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            FrameSource::SingleImage(_) => SourceKind::Image,
            FrameSource::StoredVideo(_) => SourceKind::Video,
            FrameSource::WebcamDevice(_) => SourceKind::Webcam,
            FrameSource::RemoteVideo(_) => SourceKind::YouTube,
        }
    }

    /// Open a source that needs no network access.
    pub fn open_local(self) -> Result<FrameStream> {
        match self {
            FrameSource::SingleImage(input) => {
                Ok(FrameStream::from_reader(Box::new(ImageReader::open(input)?)))
            }
            FrameSource::StoredVideo(path) => open_video_file(path),
            FrameSource::WebcamDevice(index) => open_webcam(index),
            FrameSource::RemoteVideo(url) => Err(VisionError::InvalidParameter(format!(
                "Remote source {} needs a fetcher",
                url
            ))),
        }
    }

    /// Open any source, fetching remote video to a local file first.
    pub async fn open(self, fetcher: &dyn RemoteFetcher) -> Result<FrameStream> {
        match self {
            FrameSource::RemoteVideo(url) => {
                info!("Fetching remote video {}", url);
                let path = fetcher.fetch(&url).await?;
                info!("Remote video stored at {:?}", path);
                open_video_file(path)
            }
            local => local.open_local(),
        }
    }
}

#[cfg(feature = "video")]
fn open_video_file(path: PathBuf) -> Result<FrameStream> {
    Ok(FrameStream::from_reader(Box::new(video::VideoReader::open_file(&path)?)))
}

#[cfg(not(feature = "video"))]
fn open_video_file(path: PathBuf) -> Result<FrameStream> {
    Err(VisionError::SourceUnavailable(format!(
        "Cannot decode {:?}: built without the `video` feature",
        path
    )))
}

#[cfg(feature = "video")]
fn open_webcam(index: u32) -> Result<FrameStream> {
    Ok(FrameStream::from_reader(Box::new(video::VideoReader::open_device(index)?)))
}

#[cfg(not(feature = "video"))]
fn open_webcam(index: u32) -> Result<FrameStream> {
    Err(VisionError::SourceUnavailable(format!(
        "Cannot open webcam {}: built without the `video` feature",
        index
    )))
}

/// Pull-based frame producer behind a [`FrameStream`]
pub trait FrameReader: Send {
    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Frames already held in memory
struct MemoryReader {
    frames: std::vec::IntoIter<Frame>,
}

impl FrameReader for MemoryReader {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.next())
    }
}

/// Lazy sequence of frames. Fused: after end of stream or an error it yields nothing.
pub struct FrameStream {
    reader: Box<dyn FrameReader>,
    finished: bool,
    frames_read: u64,
}

impl FrameStream {
    pub fn from_reader(reader: Box<dyn FrameReader>) -> Self {
        Self {
            reader,
            finished: false,
            frames_read: 0,
        }
    }

    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self::from_reader(Box::new(MemoryReader {
            frames: frames.into_iter(),
        }))
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl Iterator for FrameStream {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.reader.next_frame() {
            Ok(Some(frame)) => {
                self.frames_read += 1;
                Some(Ok(frame))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
