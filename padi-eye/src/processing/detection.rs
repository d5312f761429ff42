//! Object detection pipeline

use super::render::annotate;
use crate::error::{Result, VisionError};
use crate::frame::{self, Frame};
use crate::models::{Detection, DetectionModel};
use tracing::debug;

/// Reject thresholds outside [0, 1] (NaN included) instead of clamping them
pub fn validate_confidence(confidence: f32) -> Result<()> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(VisionError::InvalidParameter(format!(
            "Confidence threshold must be within [0, 1], got {}",
            confidence
        )))
    }
}

/// Result of running the detector on one frame
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    /// Input frame with detection overlays, same dimensions as the input
    pub annotated_frame: Frame,
    pub detections: Vec<Detection>,
}

/// Stable interface around an externally supplied model
pub struct DetectorAdapter {
    model: Box<dyn DetectionModel>,
    labels: Vec<String>,
}

impl DetectorAdapter {
    pub fn new(model: Box<dyn DetectionModel>) -> Self {
        let labels = model.labels();
        Self { model, labels }
    }

    /// Class vocabulary of the wrapped model
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Detect objects scoring at least `confidence` and render them onto a copy of the frame
    pub fn detect(&mut self, frame: &Frame, confidence: f32) -> Result<DetectionOutcome> {
        validate_confidence(confidence)?;

        if frame::is_empty(frame) {
            return Err(VisionError::ModelInference(format!(
                "Cannot run inference on a {}x{} frame",
                frame.width(),
                frame.height()
            )));
        }

        let raw = self.model.predict(frame, confidence).map_err(|e| match e {
            VisionError::ModelInference(msg) => VisionError::ModelInference(msg),
            other => VisionError::ModelInference(other.to_string()),
        })?;

        let detections = raw
            .into_iter()
            .map(|r| {
                let label = self.labels.get(r.class_id).cloned().ok_or_else(|| {
                    VisionError::ModelInference(format!(
                        "Class index {} outside vocabulary of {} labels",
                        r.class_id,
                        self.labels.len()
                    ))
                })?;
                Ok(Detection {
                    class_id: r.class_id,
                    label,
                    confidence: r.confidence,
                    bbox: r.bbox,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Detected {} objects", detections.len());
        let annotated_frame = annotate(frame, &detections);

        Ok(DetectionOutcome {
            annotated_frame,
            detections,
        })
    }
}
