//! PNG output for read back frames.

use std::path::Path;

use scenebatch_core::ReadbackImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreenshotError {
    #[error("pixel buffer does not match {width}x{height}")]
    SizeMismatch { width: u32, height: u32 },
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

/// Save top-down RGBA8 pixels as a PNG.
pub fn save_rgba_png(
    path: &Path,
    width: u32,
    height: u32,
    rgba: Vec<u8>,
) -> Result<(), ScreenshotError> {
    let buffer = image::RgbaImage::from_raw(width, height, rgba)
        .ok_or(ScreenshotError::SizeMismatch { width, height })?;
    buffer.save_with_format(path, image::ImageFormat::Png)?;
    tracing::info!("Saved {}x{} screenshot to {}", width, height, path.display());
    Ok(())
}

/// Save a scene readback (bottom-up BGRA) as a PNG.
pub fn save_png(path: &Path, image: &ReadbackImage) -> Result<(), ScreenshotError> {
    save_rgba_png(path, image.width, image.height, image.to_rgba8_top_down())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_png_round_trips_orientation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");

        // 1x2, bottom row blue, top row red (BGRA, bottom-up)
        let readback = ReadbackImage {
            width: 1,
            height: 2,
            pixels: vec![255, 0, 0, 255, 0, 0, 255, 255],
        };
        save_png(&path, &readback).unwrap();

        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(loaded.get_pixel(0, 1).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let result = save_rgba_png(&dir.path().join("bad.png"), 4, 4, vec![0; 8]);
        assert!(matches!(result, Err(ScreenshotError::SizeMismatch { .. })));
    }
}
