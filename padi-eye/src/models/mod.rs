//! Detection model seam and the YOLO backend

pub mod yolo_io;
#[cfg(feature = "onnx")]
pub mod yolo;

use crate::error::Result;
use crate::frame::Frame;
use serde::{Deserialize, Serialize};

#[cfg(feature = "onnx")]
pub use yolo::YoloModel;

/// Axis-aligned box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

/// Model output before the class index is resolved to a name
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// One labelled, scored, localized object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Pretrained object detector treated as a black box.
///
/// `predict` must return only detections scoring at or above `confidence`.
pub trait DetectionModel: Send {
    /// Class vocabulary, indexed by `RawDetection::class_id`
    fn labels(&self) -> Vec<String>;

    fn predict(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<RawDetection>>;
}

/// Parse the `names` metadata Ultralytics writes into ONNX exports,
/// e.g. `{0: 'leaf_blast', 1: 'brown_spot'}`.
pub fn parse_names_metadata(raw: &str) -> Vec<String> {
    let body = raw.trim().trim_start_matches('{').trim_end_matches('}');
    let mut names: Vec<(usize, String)> = Vec::new();
    let mut rest = body;

    while let Some(colon) = rest.find(':') {
        let index = rest[..colon].trim().trim_start_matches(',').trim();
        let after = rest[colon + 1..].trim_start();

        let quote = match after.chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => break,
        };
        let value_start = &after[1..];
        let Some(end) = value_start.find(quote) else {
            break;
        };

        if let Ok(i) = index.parse::<usize>() {
            names.push((i, value_start[..end].to_string()));
        }
        rest = &value_start[end + 1..];
    }

    names.sort_by_key(|(i, _)| *i);
    names.into_iter().map(|(_, name)| name).collect()
}
