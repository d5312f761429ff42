//! Frame loop and single-image flow tying sources, detector, renderer and recorder together

use crate::error::{Result, VisionError};
use crate::frame::Frame;
use crate::models::Detection;
use crate::processing::{resize_to_height, validate_confidence, DetectorAdapter};
use crate::recorder::ResultRecorder;
use crate::source::{FrameReader, FrameStream, ImageInput, ImageReader};
use crate::store::DetectionRecord;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cooperative stop flag shared between the frame loop and its controller
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<RwLock<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        *self.stopped.write() = true;
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.read()
    }
}

/// Where displayable frames go
pub trait FrameSink {
    fn show(&mut self, frame: &Frame, caption: &str) -> Result<()>;
}

/// How a frame loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSummary {
    /// Frames run through the detector
    pub frames: u64,
    /// Detections across all frames
    pub detections: u64,
    /// True when the stop signal ended the loop before end of stream
    pub stopped: bool,
}

fn validate_display_height(display_height: u32) -> Result<()> {
    if display_height == 0 {
        return Err(VisionError::InvalidDimensions(
            "Display height must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Run detection over every frame of a stream until it ends, fails, or is stopped.
///
/// The stop signal is checked once before each frame is read. Any source,
/// detection or sink error ends the loop. Nothing is recorded.
pub fn run_stream(
    mut stream: FrameStream,
    adapter: &mut DetectorAdapter,
    confidence: f32,
    display_height: u32,
    sink: &mut dyn FrameSink,
    stop: &StopSignal,
) -> Result<StreamSummary> {
    validate_confidence(confidence)?;
    validate_display_height(display_height)?;

    let mut summary = StreamSummary::default();

    loop {
        if stop.is_stopped() {
            info!("Stop requested after {} frames", summary.frames);
            summary.stopped = true;
            break;
        }

        let frame = match stream.next() {
            Some(frame) => frame?,
            None => break,
        };

        let outcome = adapter.detect(&frame, confidence)?;
        let display = resize_to_height(&outcome.annotated_frame, display_height)?;

        summary.frames += 1;
        summary.detections += outcome.detections.len() as u64;

        let caption = format!(
            "frame {}: {} detections",
            summary.frames,
            outcome.detections.len()
        );
        sink.show(&display, &caption)?;
        debug!("{}", caption);
    }

    info!(
        "Frame loop finished: {} frames, {} detections",
        summary.frames, summary.detections
    );
    Ok(summary)
}

/// Display output and recording result of a single-image run
#[derive(Debug)]
pub struct ImageOutcome {
    /// Uploaded image at display height
    pub uploaded: Frame,
    /// Annotated image at display height
    pub result: Frame,
    pub detections: Vec<Detection>,
    /// Failure to record does not invalidate the display output
    pub record: std::result::Result<DetectionRecord, VisionError>,
}

/// Detect on one still image, record the full-resolution annotated result,
/// and return both frames resized for display.
pub fn process_image(
    input: ImageInput,
    adapter: &mut DetectorAdapter,
    recorder: &ResultRecorder,
    confidence: f32,
    display_height: u32,
) -> Result<ImageOutcome> {
    validate_confidence(confidence)?;
    validate_display_height(display_height)?;

    let frame = ImageReader::open(input)?.next_frame()?.ok_or_else(|| {
        VisionError::SourceUnavailable("Image source produced no frame".to_string())
    })?;

    let outcome = adapter.detect(&frame, confidence)?;
    let uploaded = resize_to_height(&frame, display_height)?;
    let result = resize_to_height(&outcome.annotated_frame, display_height)?;

    let record = recorder.record(&outcome.detections, confidence, &outcome.annotated_frame);
    if let Err(e) = &record {
        warn!("Detection result was not recorded: {}", e);
    }

    Ok(ImageOutcome {
        uploaded,
        result,
        detections: outcome.detections,
        record,
    })
}
