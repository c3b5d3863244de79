//! Host texture descriptors and texel conversion.

use glam::Vec2;

use crate::device::TextureRegion;

/// Texel layout of a host texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    /// 8-bit palette indices, see [`TextureSource::palette`]
    P8,
}

impl PixelFormat {
    pub fn bytes_per_texel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::P8 => 1,
        }
    }
}

/// One mip level of host texel data.
#[derive(Debug, Clone, PartialEq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Texture as described by the host engine.
///
/// `cache_id` is the stable identity the cache is keyed by. The host bumps
/// `change_count` and sets `realtime_changed` whenever it rewrites texels.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSource {
    pub cache_id: u64,
    pub format: PixelFormat,
    /// RGBA palette for [`PixelFormat::P8`]
    pub palette: Vec<[u8; 4]>,
    pub mips: Vec<MipLevel>,
    /// Texels per world unit
    pub scale: Vec2,
    pub pan: Vec2,
    pub realtime_changed: bool,
    pub change_count: u32,
}

impl TextureSource {
    pub fn new(cache_id: u64, format: PixelFormat, mips: Vec<MipLevel>) -> Self {
        Self {
            cache_id,
            format,
            palette: Vec::new(),
            mips,
            scale: Vec2::ONE,
            pan: Vec2::ZERO,
            realtime_changed: false,
            change_count: 0,
        }
    }

    /// Single-level RGBA8 texture.
    pub fn rgba8(cache_id: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::new(
            cache_id,
            PixelFormat::Rgba8,
            vec![MipLevel {
                width,
                height,
                data,
            }],
        )
    }

    pub fn with_palette(mut self, palette: Vec<[u8; 4]>) -> Self {
        self.palette = palette;
        self
    }

    pub fn width(&self) -> u32 {
        self.mips.first().map_or(0, |mip| mip.width)
    }

    pub fn height(&self) -> u32 {
        self.mips.first().map_or(0, |mip| mip.height)
    }

    /// Host marks a content change.
    pub fn mark_changed(&mut self) {
        self.change_count = self.change_count.wrapping_add(1);
        self.realtime_changed = true;
    }

    /// Multiplier turning texel-space U into normalized texture coordinates.
    pub fn u_mult(&self) -> f32 {
        1.0 / (self.scale.x * self.width().max(1) as f32)
    }

    pub fn v_mult(&self) -> f32 {
        1.0 / (self.scale.y * self.height().max(1) as f32)
    }

    /// Convert a whole mip level to tightly packed RGBA8.
    pub fn convert_mip(&self, level: usize, masked: bool) -> Vec<u8> {
        let Some(mip) = self.mips.get(level) else {
            return Vec::new();
        };
        self.convert_rows(
            mip,
            TextureRegion {
                mip_level: level as u32,
                x: 0,
                y: 0,
                width: mip.width,
                height: mip.height,
            },
            masked,
        )
    }

    /// Convert a rectangle of mip 0, clipped to the texture bounds.
    ///
    /// Returns the clipped region along with its texels, or `None` when the
    /// rectangle lies entirely outside the texture.
    pub fn convert_rect(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        masked: bool,
    ) -> Option<(TextureRegion, Vec<u8>)> {
        let mip = self.mips.first()?;
        if x >= mip.width || y >= mip.height {
            return None;
        }
        let region = TextureRegion {
            mip_level: 0,
            x,
            y,
            width: width.min(mip.width - x),
            height: height.min(mip.height - y),
        };
        if region.width == 0 || region.height == 0 {
            return None;
        }
        Some((region, self.convert_rows(mip, region, masked)))
    }

    fn convert_rows(&self, mip: &MipLevel, region: TextureRegion, masked: bool) -> Vec<u8> {
        let bpp = self.format.bytes_per_texel();
        let pitch = mip.width as usize * bpp;
        let mut out = Vec::with_capacity(region.width as usize * region.height as usize * 4);

        for row in region.y..region.y + region.height {
            let start = row as usize * pitch + region.x as usize * bpp;
            let end = start + region.width as usize * bpp;
            let Some(texels) = mip.data.get(start..end) else {
                // Short host data: pad the rest of the region with black
                out.resize(region.width as usize * region.height as usize * 4, 0);
                break;
            };
            self.convert_texels(texels, masked, &mut out);
        }
        out
    }

    fn convert_texels(&self, texels: &[u8], masked: bool, out: &mut Vec<u8>) {
        match self.format {
            PixelFormat::Rgba8 => out.extend_from_slice(texels),
            PixelFormat::Bgra8 => {
                for bgra in texels.chunks_exact(4) {
                    out.extend_from_slice(&[bgra[2], bgra[1], bgra[0], bgra[3]]);
                }
            }
            PixelFormat::P8 => {
                for &index in texels {
                    if masked && index == 0 {
                        out.extend_from_slice(&[0, 0, 0, 0]);
                    } else {
                        let color = self
                            .palette
                            .get(index as usize)
                            .copied()
                            .unwrap_or([0, 0, 0, 255]);
                        out.extend_from_slice(&color);
                    }
                }
            }
        }
    }
}
