//! YOLO object detection model (Ultralytics YOLOv8 ONNX export)

use super::yolo_io::{apply_nms, decode_output, frame_to_chw_tensor, FrameGeometry};
use super::{parse_names_metadata, DetectionModel, RawDetection};
use crate::config::VisionConfig;
use crate::error::{Result, VisionError};
use crate::frame::Frame;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use tracing::{debug, info};

fn ort_err<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> VisionError {
    move |e| VisionError::ModelInference(format!("{}: {}", context, e))
}

/// YOLO model for object detection
pub struct YoloModel {
    session: Session,
    input_size: u32,
    iou_threshold: f32,
    labels: Vec<String>,
}

impl YoloModel {
    /// Load the model named by the configuration
    pub fn new(config: &VisionConfig) -> Result<Self> {
        Self::load(&config.model_path, config)
    }

    pub fn load(model_path: &Path, config: &VisionConfig) -> Result<Self> {
        if !model_path.is_file() {
            return Err(VisionError::Config(format!(
                "Model file {:?} does not exist",
                model_path
            )));
        }

        let session = Session::builder()
            .map_err(ort_err("Failed to create session builder"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort_err("Failed to set optimization level"))?
            .commit_from_file(model_path)
            .map_err(ort_err("Failed to load YOLO model"))?;

        let labels = if config.labels.is_empty() {
            read_names(&session)?
        } else {
            config.labels.clone()
        };

        if labels.is_empty() {
            return Err(VisionError::Config(format!(
                "Model {:?} has no class names; set `labels` in the configuration",
                model_path
            )));
        }

        info!(
            "YOLO model loaded from {:?} with {} classes",
            model_path,
            labels.len()
        );

        Ok(Self {
            session,
            input_size: config.input_size,
            iou_threshold: config.iou_threshold,
            labels,
        })
    }
}

fn read_names(session: &Session) -> Result<Vec<String>> {
    let metadata = session
        .metadata()
        .map_err(ort_err("Failed to read model metadata"))?;
    let names = metadata
        .custom("names")
        .map_err(ort_err("Failed to read `names` metadata"))?;
    Ok(names.map(|raw| parse_names_metadata(&raw)).unwrap_or_default())
}

impl DetectionModel for YoloModel {
    fn labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn predict(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<RawDetection>> {
        debug!("Running YOLO detection on {}x{} frame", frame.width(), frame.height());

        let size = self.input_size as usize;
        let chw = frame_to_chw_tensor(frame, self.input_size)?;
        let input = Tensor::from_array(([1usize, 3, size, size], chw))
            .map_err(ort_err("Failed to create input tensor"))?;

        let input_name = self
            .session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| VisionError::ModelInference("Model declares no inputs".to_string()))?;
        let output_name = self
            .session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| VisionError::ModelInference("Model declares no outputs".to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![input_name.as_str() => input])
            .map_err(ort_err("YOLO inference failed"))?;

        let (shape, data) = outputs[output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(ort_err("Failed to extract output tensor"))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        let geometry = FrameGeometry {
            input_size: self.input_size,
            frame_width: frame.width(),
            frame_height: frame.height(),
        };
        let candidates = decode_output(data, &dims, self.labels.len(), confidence, geometry)?;
        let detections = apply_nms(candidates, self.iou_threshold);

        debug!("YOLO detected {} objects", detections.len());
        Ok(detections)
    }
}
