//! Vision processing: detection and presentation rendering

pub mod detection;
pub mod render;

pub use detection::{validate_confidence, DetectionOutcome, DetectorAdapter};
pub use render::{annotate, resize_to_height};
