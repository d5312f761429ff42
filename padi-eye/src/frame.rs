//! Raster frames shared by every pipeline stage

use crate::error::{Result, VisionError};
use image::RgbImage;

/// A single height x width x 3 raster of 8-bit RGB samples.
pub type Frame = RgbImage;

/// Decode an encoded still image (JPEG, PNG, ...) into a frame.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| VisionError::SourceUnavailable(format!("Failed to decode image: {}", e)))?;
    Ok(image.to_rgb8())
}

/// Build a frame from tightly packed RGB samples.
pub fn frame_from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Frame> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|p| p.checked_mul(3))
        .ok_or_else(|| VisionError::InvalidDimensions("Frame size would overflow".to_string()))?;

    if data.len() != expected {
        return Err(VisionError::InvalidDimensions(format!(
            "Expected {} bytes for {}x{} RGB frame, got {}",
            expected,
            width,
            height,
            data.len()
        )));
    }

    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| VisionError::InvalidDimensions(format!("{}x{} frame", width, height)))
}

/// Returns true when the frame has no pixels.
pub fn is_empty(frame: &Frame) -> bool {
    frame.width() == 0 || frame.height() == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb};
    use std::io::Cursor;

    #[test]
    fn test_decode_png_roundtrip_dimensions() {
        let frame = RgbImage::from_pixel(7, 3, Rgb([10, 20, 30]));
        let mut buf = Cursor::new(Vec::new());
        frame.write_to(&mut buf, ImageOutputFormat::Png).unwrap();

        let decoded = decode_frame(buf.get_ref()).unwrap();
        assert_eq!(decoded.dimensions(), (7, 3));
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_decode_garbage_is_source_unavailable() {
        let err = decode_frame(b"definitely not an image").unwrap_err();
        assert!(matches!(err, VisionError::SourceUnavailable(_)));
    }

    #[test]
    fn test_frame_from_rgb_length_mismatch() {
        let err = frame_from_rgb(2, 2, vec![0; 11]).unwrap_err();
        assert!(matches!(err, VisionError::InvalidDimensions(_)));
        assert!(frame_from_rgb(2, 2, vec![0; 12]).is_ok());
    }

    #[test]
    fn test_is_empty() {
        assert!(is_empty(&RgbImage::new(0, 5)));
        assert!(!is_empty(&RgbImage::new(1, 1)));
    }
}
