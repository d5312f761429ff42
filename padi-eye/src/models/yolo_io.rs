//! YOLOv8 tensor layout: input packing and output decoding

use super::{BoundingBox, RawDetection};
use crate::error::{Result, VisionError};
use crate::frame::Frame;
use image::imageops::{self, FilterType};

/// Resize a frame to the square model input and pack it as normalized CHW floats.
pub fn frame_to_chw_tensor(frame: &Frame, input_size: u32) -> Result<Vec<f32>> {
    if input_size == 0 {
        return Err(VisionError::InvalidParameter("Input size cannot be zero".to_string()));
    }

    if frame.width() == 0 || frame.height() == 0 {
        return Err(VisionError::ModelInference("Invalid image dimensions".to_string()));
    }

    let plane = (input_size as usize)
        .checked_mul(input_size as usize)
        .ok_or_else(|| VisionError::InvalidParameter("Input size would overflow".to_string()))?;

    let resized = imageops::resize(frame, input_size, input_size, FilterType::Triangle);

    let mut chw = vec![0.0f32; plane * 3];
    for (i, pixel) in resized.pixels().enumerate() {
        chw[i] = pixel[0] as f32 / 255.0;
        chw[plane + i] = pixel[1] as f32 / 255.0;
        chw[2 * plane + i] = pixel[2] as f32 / 255.0;
    }

    Ok(chw)
}

/// Geometry needed to map model-space boxes back onto the source frame
#[derive(Debug, Clone, Copy)]
pub struct FrameGeometry {
    pub input_size: u32,
    pub frame_width: u32,
    pub frame_height: u32,
}

/// Decode a `[1, 4 + classes, anchors]` YOLOv8 output.
///
/// Each anchor keeps its best class; anchors scoring below `confidence` are dropped.
pub fn decode_output(
    data: &[f32],
    shape: &[i64],
    num_classes: usize,
    confidence: f32,
    geometry: FrameGeometry,
) -> Result<Vec<RawDetection>> {
    if shape.len() != 3 || shape[0] != 1 {
        return Err(VisionError::ModelInference(format!(
            "Unexpected YOLO output shape {:?}",
            shape
        )));
    }

    let rows = shape[1] as usize;
    let anchors = shape[2] as usize;
    if rows < 5 || rows - 4 != num_classes {
        return Err(VisionError::ModelInference(format!(
            "Output has {} class rows but vocabulary has {} labels",
            rows.saturating_sub(4),
            num_classes
        )));
    }

    let expected = rows
        .checked_mul(anchors)
        .ok_or_else(|| VisionError::ModelInference("Output shape would overflow".to_string()))?;
    if data.len() != expected {
        return Err(VisionError::ModelInference(format!(
            "Output holds {} values, shape {:?} needs {}",
            data.len(),
            shape,
            expected
        )));
    }

    let scale_x = geometry.frame_width as f32 / geometry.input_size as f32;
    let scale_y = geometry.frame_height as f32 / geometry.input_size as f32;
    let frame_w = geometry.frame_width as f32;
    let frame_h = geometry.frame_height as f32;

    let at = |row: usize, anchor: usize| data[row * anchors + anchor];
    let mut detections = Vec::new();

    for anchor in 0..anchors {
        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for class_idx in 0..num_classes {
            let score = at(4 + class_idx, anchor);
            if score > best_score {
                best_score = score;
                best_class = class_idx;
            }
        }

        if !best_score.is_finite() || best_score < confidence {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        if !cx.is_finite() || !cy.is_finite() || !w.is_finite() || !h.is_finite() {
            continue;
        }

        let x0 = ((cx - w / 2.0) * scale_x).clamp(0.0, frame_w);
        let y0 = ((cy - h / 2.0) * scale_y).clamp(0.0, frame_h);
        let x1 = ((cx + w / 2.0) * scale_x).clamp(0.0, frame_w);
        let y1 = ((cy + h / 2.0) * scale_y).clamp(0.0, frame_h);

        if x1 <= x0 || y1 <= y0 {
            continue;
        }

        detections.push(RawDetection {
            class_id: best_class,
            confidence: best_score.min(1.0),
            bbox: BoundingBox::new(x0, y0, x1 - x0, y1 - y0),
        });
    }

    Ok(detections)
}

/// Class-aware non-maximum suppression, highest confidence first
pub fn apply_nms(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    if detections.is_empty() {
        return detections;
    }

    detections.retain(|d| d.confidence.is_finite());
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[j].class_id != detections[i].class_id {
                continue;
            }

            if compute_iou(&detections[i].bbox, &detections[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection over union of two boxes; 0.0 for degenerate input
pub fn compute_iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let values = [a.x, a.y, a.width, a.height, b.x, b.y, b.width, b.height];
    if values.iter().any(|v| !v.is_finite()) {
        return 0.0;
    }

    if a.width < 0.0 || a.height < 0.0 || b.width < 0.0 || b.height < 0.0 {
        return 0.0;
    }

    let inter_x_min = a.x.max(b.x);
    let inter_y_min = a.y.max(b.y);
    let inter_x_max = (a.x + a.width).min(b.x + b.width);
    let inter_y_max = (a.y + a.height).min(b.y + b.height);

    if inter_x_max <= inter_x_min || inter_y_max <= inter_y_min {
        return 0.0;
    }

    let inter_area = (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min);
    let union_area = a.width * a.height + b.width * b.height - inter_area;

    if union_area <= 0.0 || !union_area.is_finite() {
        return 0.0;
    }

    (inter_area / union_area).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn raw(class_id: usize, confidence: f32, bbox: (f32, f32, f32, f32)) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox: BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3),
        }
    }

    #[test]
    fn test_chw_layout() {
        let frame = RgbImage::from_pixel(8, 4, Rgb([255, 0, 51]));
        let chw = frame_to_chw_tensor(&frame, 2).unwrap();
        assert_eq!(chw.len(), 12);
        assert!(chw[..4].iter().all(|v| (*v - 1.0).abs() < 1e-6));
        assert!(chw[4..8].iter().all(|v| v.abs() < 1e-6));
        assert!(chw[8..].iter().all(|v| (*v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_chw_rejects_empty_frame() {
        assert!(frame_to_chw_tensor(&RgbImage::new(0, 0), 640).is_err());
        assert!(frame_to_chw_tensor(&RgbImage::new(2, 2), 0).is_err());
    }

    #[test]
    fn test_decode_output_threshold_and_scaling() {
        // 2 classes, 3 anchors; rows: cx, cy, w, h, class0, class1
        let anchors = 3;
        let mut data = vec![0.0f32; 6 * anchors];
        let mut set = |row: usize, anchor: usize, v: f32| data[row * anchors + anchor] = v;
        // anchor 0: class 1 at 0.9, centred box 20x20 around (50, 50)
        set(0, 0, 50.0);
        set(1, 0, 50.0);
        set(2, 0, 20.0);
        set(3, 0, 20.0);
        set(5, 0, 0.9);
        // anchor 1: best score 0.2, below threshold
        set(0, 1, 10.0);
        set(1, 1, 10.0);
        set(2, 1, 4.0);
        set(3, 1, 4.0);
        set(4, 1, 0.2);
        // anchor 2: exactly at threshold is kept
        set(0, 2, 80.0);
        set(1, 2, 80.0);
        set(2, 2, 10.0);
        set(3, 2, 10.0);
        set(4, 2, 0.25);

        let geometry = FrameGeometry {
            input_size: 100,
            frame_width: 200,
            frame_height: 100,
        };
        let detections = decode_output(&data, &[1, 6, 3], 2, 0.25, geometry).unwrap();
        assert_eq!(detections.len(), 2);

        assert_eq!(detections[0].class_id, 1);
        assert!((detections[0].confidence - 0.9).abs() < 1e-6);
        assert!((detections[0].bbox.x - 80.0).abs() < 1e-4);
        assert!((detections[0].bbox.y - 40.0).abs() < 1e-4);
        assert!((detections[0].bbox.width - 40.0).abs() < 1e-4);
        assert!((detections[0].bbox.height - 20.0).abs() < 1e-4);

        assert_eq!(detections[1].class_id, 0);
    }

    #[test]
    fn test_decode_output_rejects_vocabulary_mismatch() {
        let data = vec![0.0f32; 7 * 2];
        let geometry = FrameGeometry {
            input_size: 640,
            frame_width: 640,
            frame_height: 640,
        };
        let err = decode_output(&data, &[1, 7, 2], 2, 0.5, geometry).unwrap_err();
        assert!(matches!(err, VisionError::ModelInference(_)));
        assert!(decode_output(&data, &[7, 2], 3, 0.5, geometry).is_err());
    }

    #[test]
    fn test_nms_suppresses_same_class_only() {
        let detections = vec![
            raw(0, 0.8, (10.0, 10.0, 50.0, 50.0)),
            raw(0, 0.9, (12.0, 12.0, 50.0, 50.0)),
            raw(1, 0.7, (12.0, 12.0, 50.0, 50.0)),
        ];
        let kept = apply_nms(detections, 0.5);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(kept[1].class_id, 1);
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!((compute_iou(&a, &a) - 1.0).abs() < 1e-6);

        let b = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        assert!((compute_iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);

        let far = BoundingBox::new(100.0, 100.0, 1.0, 1.0);
        assert_eq!(compute_iou(&a, &far), 0.0);

        let nan = BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0);
        assert_eq!(compute_iou(&a, &nan), 0.0);
    }
}
