//! Image decode and export.
//!
//! Export ("flatten") serialises an already-composed frame to JPEG — it never
//! re-renders, so two calls against the same frame produce byte-identical
//! output.

use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};

/// Quality used for the flattened export.
pub const EXPORT_JPEG_QUALITY: u8 = 90;

/// Decode an image from raw bytes (png/jpeg/webp/bmp) into RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, String> {
    image::load_from_memory(bytes)
        .map(|d| d.into_rgba8())
        .map_err(|e| format!("could not decode image: {e}"))
}

/// Load and decode an image file.
pub fn load_image(path: &Path) -> Result<RgbaImage, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("could not read {}: {e}", path.display()))?;
    decode_image(&bytes)
}

/// Serialise a composed frame to JPEG bytes for upload and capability calls.
/// Alpha is dropped (the frame is opaque by construction).
pub fn flatten_jpeg(frame: &RgbaImage) -> Result<Vec<u8>, String> {
    let rgb = DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, EXPORT_JPEG_QUALITY);
    encoder
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
        .map_err(|e| format!("jpeg encode failed: {e}"))?;
    Ok(buf)
}

/// Native open-file dialog filtered to supported image formats.
pub fn pick_image_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp"])
        .pick_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ViewTransform;
    use crate::render;
    use egui::{pos2, vec2};
    use image::Rgba;

    fn test_frame() -> RgbaImage {
        let mut bg = RgbaImage::from_pixel(80, 60, Rgba([40, 80, 120, 255]));
        for x in 0..40 {
            bg.put_pixel(x, 10, Rgba([200, 40, 40, 255]));
        }
        let transform = ViewTransform::fit(vec2(80.0, 60.0), vec2(160.0, 120.0));
        render::compose_background(&bg, &transform, (160, 120))
    }

    #[test]
    fn flatten_is_idempotent() {
        let frame = test_frame();
        let a = flatten_jpeg(&frame).unwrap();
        let b = flatten_jpeg(&frame).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn flatten_round_trips_through_decode() {
        let frame = test_frame();
        let jpeg = flatten_jpeg(&frame).unwrap();
        let decoded = decode_image(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), frame.dimensions());
    }

    #[test]
    fn flatten_excludes_selection_overlay() {
        let frame = test_frame();
        let exported = flatten_jpeg(&frame).unwrap();

        // The display copy gets the overlay; the export frame must not change
        let mut display = frame.clone();
        render::draw_selection_overlay(
            &mut display,
            egui::Rect::from_min_max(pos2(20.0, 20.0), pos2(100.0, 60.0)),
        );
        assert_ne!(display.as_raw(), frame.as_raw());
        assert_eq!(flatten_jpeg(&frame).unwrap(), exported);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_image(b"definitely not an image").is_err());
    }
}
