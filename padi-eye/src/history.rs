//! Reading back past detection records

use crate::error::{Result, VisionError};
use crate::frame::{decode_frame, Frame};
use crate::processing::resize_to_height;
use crate::store::{DetectionRecord, DetectionStore};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

/// Decode a record's stored image back into a frame
pub fn decode_image(record: &DetectionRecord) -> Result<Frame> {
    let bytes = STANDARD.decode(record.image_base64.as_bytes()).map_err(|e| {
        VisionError::Persistence(format!("Record {} has corrupt image data: {}", record.id, e))
    })?;

    decode_frame(&bytes).map_err(|e| {
        VisionError::Persistence(format!("Record {} image cannot be decoded: {}", record.id, e))
    })
}

/// A record prepared for display
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: u64,
    pub object_name: String,
    /// Stored threshold formatted to two decimals
    pub confidence: String,
    pub timestamp: String,
    pub image: Frame,
}

impl HistoryEntry {
    fn from_record(record: &DetectionRecord, display_height: u32) -> Result<Self> {
        let image = resize_to_height(&decode_image(record)?, display_height)?;
        let confidence = record
            .confidence
            .parse::<f32>()
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|_| record.confidence.clone());

        Ok(Self {
            id: record.id,
            object_name: record.object_name.clone(),
            confidence,
            timestamp: record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            image,
        })
    }
}

/// Read-only view over the detection store
pub struct HistoryReader {
    store: Arc<dyn DetectionStore>,
}

impl HistoryReader {
    pub fn new(store: Arc<dyn DetectionStore>) -> Self {
        Self { store }
    }

    /// Every record in ascending id order
    pub fn list_all(&self) -> Result<Vec<DetectionRecord>> {
        self.store.list_all()
    }

    /// Every record decoded and resized to `display_height`
    pub fn entries(&self, display_height: u32) -> Result<Vec<HistoryEntry>> {
        self.list_all()?
            .iter()
            .map(|record| HistoryEntry::from_record(record, display_height))
            .collect()
    }
}
