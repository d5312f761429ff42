//! padi-eye: object detection front-end
//!
//! Pulls frames from still images, stored video, webcams or remote video,
//! runs a pretrained detector over them, renders the detections and keeps an
//! append-only history of still-image results.

pub mod config;
pub mod error;
pub mod frame;
pub mod history;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod recorder;
pub mod source;
pub mod store;

pub use config::VisionConfig;
pub use error::{Result, VisionError};
pub use frame::Frame;
pub use history::{HistoryEntry, HistoryReader};
pub use models::{BoundingBox, Detection, DetectionModel, RawDetection};
pub use pipeline::{process_image, run_stream, FrameSink, ImageOutcome, StopSignal, StreamSummary};
pub use processing::{DetectionOutcome, DetectorAdapter};
pub use recorder::ResultRecorder;
pub use source::{FrameSource, FrameStream, ImageInput, SourceKind};
pub use store::{DetectionRecord, DetectionStore, NewRecord, RecordStore};
