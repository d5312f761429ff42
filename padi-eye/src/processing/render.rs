//! Annotation overlays and display resizing

use crate::error::{Result, VisionError};
use crate::frame::Frame;
use crate::models::{BoundingBox, Detection};
use image::imageops::{self, FilterType};
use image::Rgb;

const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [0, 194, 255],
    [52, 69, 147],
];

/// Stable overlay colour for a class
pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// `round(target_height * width / height)` with halves rounded up.
///
/// Departs from that formula in one case: a result of 0 (very tall, narrow
/// frames) is raised to 1 so the resized frame is never empty.
pub fn scaled_width(width: u32, height: u32, target_height: u32) -> Result<u32> {
    if target_height == 0 {
        return Err(VisionError::InvalidDimensions("Target height must be positive".to_string()));
    }

    if width == 0 || height == 0 {
        return Err(VisionError::InvalidDimensions(format!(
            "Cannot resize a {}x{} frame",
            width, height
        )));
    }

    let numerator = target_height as u64 * width as u64;
    let rounded = (2 * numerator + height as u64) / (2 * height as u64);

    u32::try_from(rounded.max(1))
        .map_err(|_| VisionError::InvalidDimensions(format!("Scaled width {} overflows", rounded)))
}

/// Resize to a fixed height, preserving aspect ratio up to integer rounding.
pub fn resize_to_height(frame: &Frame, target_height: u32) -> Result<Frame> {
    let width = scaled_width(frame.width(), frame.height(), target_height)?;

    if frame.height() == target_height && frame.width() == width {
        return Ok(frame.clone());
    }

    Ok(imageops::resize(frame, width, target_height, FilterType::Triangle))
}

/// Clamp a pixel-space box to the frame, as inclusive corners
fn clamp_box(bbox: &BoundingBox, dims: (u32, u32)) -> Option<[u32; 4]> {
    let (w, h) = dims;
    if w == 0 || h == 0 {
        return None;
    }

    let clamp = |v: f32, max: u32| -> u32 { v.max(0.0).min((max - 1) as f32) as u32 };
    let x0 = clamp(bbox.x, w);
    let y0 = clamp(bbox.y, h);
    let x1 = clamp(bbox.x + bbox.width, w);
    let y1 = clamp(bbox.y + bbox.height, h);

    if !bbox.x.is_finite() || !bbox.y.is_finite() || x0 > x1 || y0 > y1 {
        return None;
    }
    Some([x0, y0, x1, y1])
}

// Border drawing follows vision_core's overlay: `thickness` nested one-pixel
// rectangles, shrinking inward. Corners must come from `clamp_box`.
fn draw_rect(img: &mut Frame, [x0, y0, x1, y1]: [u32; 4], color: Rgb<u8>, thickness: u32) {
    for t in 0..thickness {
        let (left, top) = (x0 + t, y0 + t);
        let (Some(right), Some(bottom)) = (x1.checked_sub(t), y1.checked_sub(t)) else {
            break;
        };
        if left > right || top > bottom {
            break;
        }
        for x in left..=right {
            img.put_pixel(x, top, color);
            img.put_pixel(x, bottom, color);
        }
        for y in top..=bottom {
            img.put_pixel(left, y, color);
            img.put_pixel(right, y, color);
        }
    }
}

/// Copy of `frame` with one box per detection burned in
pub fn annotate(frame: &Frame, detections: &[Detection]) -> Frame {
    let mut annotated = frame.clone();
    let thickness = (frame.width().min(frame.height()) / 200).max(2);

    for detection in detections {
        if let Some(px) = clamp_box(&detection.bbox, annotated.dimensions()) {
            draw_rect(&mut annotated, px, class_color(detection.class_id), thickness);
        }
    }

    annotated
}
