//! Texture storage for cached scene textures.

use hashbrown::HashMap;

use scenebatch_core::device::{GpuTextureId, TextureRegion};

/// One uploaded texture.
pub(crate) struct TextureEntry {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
}

/// All live textures, keyed by the id handed to the texture cache.
///
/// Ids are never reused, so a stale id simply misses.
pub struct TextureStore {
    textures: HashMap<u32, TextureEntry>,
    next_texture_id: u32,
}

impl TextureStore {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            next_texture_id: 1,
        }
    }

    pub fn create(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        mip_count: u32,
    ) -> GpuTextureId {
        let id = self.next_texture_id;
        self.next_texture_id += 1;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("Scene Texture {}", id)),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        tracing::debug!(
            "Created texture {}: {}x{} ({} mips)",
            id,
            width,
            height,
            mip_count
        );

        self.textures.insert(
            id,
            TextureEntry {
                texture,
                view,
                width,
                height,
                mip_count,
            },
        );
        GpuTextureId(id)
    }

    /// Write RGBA8 texels into a region. Out of range writes are dropped.
    pub fn upload(
        &self,
        queue: &wgpu::Queue,
        id: GpuTextureId,
        region: TextureRegion,
        rgba: &[u8],
    ) {
        let Some(entry) = self.textures.get(&id.0) else {
            tracing::warn!("Upload to unknown texture {}", id.0);
            return;
        };
        if !region_fits(entry, region) || rgba.len() < (region.width * region.height * 4) as usize
        {
            tracing::warn!("Dropping out of range upload to texture {}: {:?}", id.0, region);
            return;
        }

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: region.mip_level,
                origin: wgpu::Origin3d {
                    x: region.x,
                    y: region.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(region.width * 4),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Drop a texture. Bind groups already recorded keep it alive until
    /// they are released.
    pub fn remove(&mut self, id: GpuTextureId) -> bool {
        self.textures.remove(&id.0).is_some()
    }

    pub fn view(&self, id: GpuTextureId) -> Option<&wgpu::TextureView> {
        self.textures.get(&id.0).map(|entry| &entry.view)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl Default for TextureStore {
    fn default() -> Self {
        Self::new()
    }
}

fn region_fits(entry: &TextureEntry, region: TextureRegion) -> bool {
    if region.mip_level >= entry.mip_count {
        return false;
    }
    let (width, height) = mip_size(entry.width, entry.height, region.mip_level);
    region.x + region.width <= width && region.y + region.height <= height
}

/// Size of mip `level` for a `width` x `height` texture.
pub fn mip_size(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_size_never_zero() {
        assert_eq!(mip_size(64, 16, 0), (64, 16));
        assert_eq!(mip_size(64, 16, 2), (16, 4));
        assert_eq!(mip_size(64, 16, 5), (2, 1));
        assert_eq!(mip_size(64, 16, 9), (1, 1));
    }
}
