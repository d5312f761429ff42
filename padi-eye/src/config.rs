//! Configuration for padi-eye

use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Vision pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Path to the YOLO ONNX export
    pub model_path: PathBuf,
    /// Optional label vocabulary; when empty the model's own `names` metadata is used
    pub labels: Vec<String>,
    /// Square model input size in pixels
    pub input_size: u32,
    /// IoU threshold used for non-maximum suppression
    pub iou_threshold: f32,
    /// Default confidence threshold
    pub confidence: f32,
    /// Height every displayed frame is resized to
    pub display_height: u32,
    /// Webcam device index (0, 1, 2, etc.)
    pub webcam_index: u32,
    /// Detection history database directory
    pub database_path: PathBuf,
    /// JPEG quality for recorded result images
    pub jpeg_quality: u8,
    /// Upper bound for a remote video fetch
    pub fetch_timeout_secs: u64,
    /// External downloader program used for YouTube URLs
    pub downloader: String,
    /// Directory fetched videos are written to
    pub download_dir: PathBuf,
}

impl Default for VisionConfig {
    fn default() -> Self {
        let download_dir = dirs::cache_dir()
            .map(|mut p| {
                p.push("padi-eye");
                p.push("downloads");
                p
            })
            .unwrap_or_else(|| std::env::temp_dir().join("padi-eye"));

        Self {
            model_path: PathBuf::from("weights/best.onnx"),
            labels: Vec::new(),
            input_size: 640,
            iou_threshold: 0.7,
            confidence: 0.25,
            display_height: 300,
            webcam_index: 0,
            database_path: PathBuf::from("./detections.db"),
            jpeg_quality: 90,
            fetch_timeout_secs: 300,
            downloader: "yt-dlp".to_string(),
            download_dir,
        }
    }
}

impl VisionConfig {
    /// Load configuration from a JSON or TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VisionError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;
        Self::from_str(&content)
    }

    /// Load configuration from a JSON or TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        if let Ok(config) = serde_json::from_str::<VisionConfig>(content) {
            return Ok(config);
        }

        toml::from_str::<VisionConfig>(content)
            .map_err(|e| VisionError::Config(format!("Unrecognized config format: {}", e)))
    }

    /// Overlay `PADI_*` environment variables on top of this configuration
    pub fn with_env(mut self) -> Self {
        if let Ok(path) = std::env::var("PADI_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("PADI_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }

        if let Ok(conf) = std::env::var("PADI_CONFIDENCE") {
            if let Ok(c) = conf.parse::<f32>() {
                self.confidence = c;
            }
        }

        if let Ok(index) = std::env::var("PADI_WEBCAM_INDEX") {
            if let Ok(i) = index.parse::<u32>() {
                self.webcam_index = i;
            }
        }

        if let Ok(height) = std::env::var("PADI_DISPLAY_HEIGHT") {
            if let Ok(h) = height.parse::<u32>() {
                self.display_height = h;
            }
        }

        self
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(VisionError::Config(format!(
                "Confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }

        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(VisionError::Config(format!(
                "IoU threshold must be within [0, 1], got {}",
                self.iou_threshold
            )));
        }

        if self.display_height == 0 {
            return Err(VisionError::Config("Display height must be non-zero".to_string()));
        }

        if self.input_size == 0 || self.input_size > 4096 {
            return Err(VisionError::Config("Input size must be between 1 and 4096".to_string()));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(VisionError::Config("JPEG quality must be between 1 and 100".to_string()));
        }

        if self.fetch_timeout_secs == 0 {
            return Err(VisionError::Config("Fetch timeout must be non-zero".to_string()));
        }

        if self.downloader.trim().is_empty() {
            return Err(VisionError::Config("Downloader program must be set".to_string()));
        }

        Ok(())
    }
}
