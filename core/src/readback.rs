//! Conversion of the half-float scene image into host screenshot pixels.

use crate::device::HalfImage;

/// 8-bit BGRA pixels, bottom row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadbackImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Round and clamp a linear channel value into a byte.
pub fn channel_to_u8(value: f32) -> u8 {
    // NaN maps to 0 through the saturating cast
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

impl ReadbackImage {
    /// Convert an RGBA16F image (top row first) into bottom-up BGRA8.
    pub fn from_half(image: &HalfImage) -> Self {
        let width = image.width as usize;
        let height = image.height as usize;
        if width == 0 || height == 0 {
            return Self {
                width: image.width,
                height: image.height,
                pixels: Vec::new(),
            };
        }
        let mut pixels = vec![0u8; width * height * 4];

        for (y, row) in image.texels.chunks_exact(width * 4).take(height).enumerate() {
            let dest_row = height - y - 1;
            let dest = &mut pixels[dest_row * width * 4..(dest_row + 1) * width * 4];
            for (dst, src) in dest.chunks_exact_mut(4).zip(row.chunks_exact(4)) {
                dst[2] = channel_to_u8(src[0].to_f32());
                dst[1] = channel_to_u8(src[1].to_f32());
                dst[0] = channel_to_u8(src[2].to_f32());
                dst[3] = channel_to_u8(src[3].to_f32());
            }
        }

        Self {
            width: image.width,
            height: image.height,
            pixels,
        }
    }

    /// BGRA pixel at `(x, y)` counted from the bottom-left.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Top-down RGBA8, the layout image encoders expect.
    pub fn to_rgba8_top_down(&self) -> Vec<u8> {
        let row_bytes = self.width as usize * 4;
        let mut out = Vec::with_capacity(self.pixels.len());
        for row in self.pixels.chunks_exact(row_bytes.max(1)).rev() {
            for bgra in row.chunks_exact(4) {
                out.extend_from_slice(&[bgra[2], bgra[1], bgra[0], bgra[3]]);
            }
        }
        out
    }
}
