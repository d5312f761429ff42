//! Persisting detection results

use crate::error::{Result, VisionError};
use crate::frame::{self, Frame};
use crate::models::Detection;
use crate::processing::validate_confidence;
use crate::store::{DetectionRecord, DetectionStore, NewRecord};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Distinct labels in lexicographic order, joined by ", ".
///
/// Empty when there are no detections.
pub fn summarize_labels(detections: &[Detection]) -> String {
    detections
        .iter()
        .map(|d| d.label.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(", ")
}

/// JPEG-encode a frame and wrap it as standard base64
pub fn encode_frame(frame: &Frame, quality: u8) -> Result<String> {
    if frame::is_empty(frame) {
        return Err(VisionError::InvalidDimensions(format!(
            "Cannot encode a {}x{} frame",
            frame.width(),
            frame.height()
        )));
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        ColorType::Rgb8,
    )?;

    Ok(STANDARD.encode(&jpeg))
}

/// Writes one record per processed still image
pub struct ResultRecorder {
    store: Arc<dyn DetectionStore>,
    jpeg_quality: u8,
}

impl ResultRecorder {
    pub fn new(store: Arc<dyn DetectionStore>, jpeg_quality: u8) -> Self {
        Self {
            store,
            jpeg_quality,
        }
    }

    /// Persist a detection result.
    ///
    /// The stored confidence is the threshold the detection ran with, not a
    /// per-detection score.
    pub fn record(
        &self,
        detections: &[Detection],
        confidence: f32,
        annotated: &Frame,
    ) -> Result<DetectionRecord> {
        validate_confidence(confidence)?;

        let image_base64 = encode_frame(annotated, self.jpeg_quality)
            .map_err(|e| VisionError::Persistence(format!("Failed to encode result image: {}", e)))?;

        let record = self.store.insert(NewRecord {
            object_name: summarize_labels(detections),
            confidence: confidence.to_string(),
            image_base64,
        })?;

        info!(
            "Recorded detection {}: [{}] at threshold {}",
            record.id, record.object_name, record.confidence
        );
        Ok(record)
    }
}
