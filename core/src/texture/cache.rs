//! Two-variant texture cache keyed by host cache id.

use hashbrown::HashMap;

use crate::device::{DeviceError, GpuDevice, GpuTextureId, TextureRegion};

use super::source::TextureSource;

/// Which cached form of a texture to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheVariant {
    Unmasked = 0,
    Masked = 1,
}

impl CacheVariant {
    pub fn from_masked(masked: bool) -> Self {
        if masked { Self::Masked } else { Self::Unmasked }
    }

    fn is_masked(self) -> bool {
        self == Self::Masked
    }
}

/// Internal cache entry
struct CachedTexture {
    texture: GpuTextureId,
    width: u32,
    height: u32,
    mip_count: u32,
    /// Host change counter at the time of the last full upload
    change_count: u32,
}

/// Device textures for host sources, one table per [`CacheVariant`].
///
/// Owned by the renderer for the lifetime of its device. The 1x1 white null
/// texture is created on first request and is not affected by [`clear`].
///
/// Textures replaced by a resize are retired rather than destroyed, since
/// pending draws may still reference them. See
/// [`release_retired`](TextureCache::release_retired).
///
/// [`clear`]: TextureCache::clear
pub struct TextureCache {
    tables: [HashMap<u64, CachedTexture>; 2],
    null_texture: Option<GpuTextureId>,
    retired: Vec<GpuTextureId>,
    /// Sources larger than this in either dimension are not uploaded
    max_size: u32,
    uploads: u64,
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::with_max_size(u32::MAX)
    }
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(max_size: u32) -> Self {
        Self {
            tables: Default::default(),
            null_texture: None,
            retired: Vec::new(),
            max_size,
            uploads: 0,
        }
    }

    /// Device texture for `source`, uploading it if needed.
    ///
    /// A missing source resolves to `None`; callers bind the null texture in
    /// its place. A pending realtime change with a new counter triggers one
    /// full re-upload. The pending flag is always consumed.
    pub fn resolve<D: GpuDevice>(
        &mut self,
        device: &mut D,
        source: Option<&mut TextureSource>,
        variant: CacheVariant,
    ) -> Result<Option<GpuTextureId>, DeviceError> {
        let Some(source) = source else {
            return Ok(None);
        };
        if source.width() == 0 || source.height() == 0 {
            tracing::warn!("Texture {:#x} has no texel data", source.cache_id);
            return Ok(None);
        }
        if source.width() > self.max_size || source.height() > self.max_size {
            tracing::warn!(
                "Texture {:#x} is {}x{}, larger than the {} texel limit",
                source.cache_id,
                source.width(),
                source.height(),
                self.max_size
            );
            return Ok(None);
        }

        let table = &mut self.tables[variant as usize];
        let Some(entry) = table.get_mut(&source.cache_id) else {
            let entry = create_and_upload(device, source, variant)?;
            let texture = entry.texture;
            table.insert(source.cache_id, entry);
            self.uploads += 1;
            return Ok(Some(texture));
        };

        if source.realtime_changed {
            source.realtime_changed = false;
            if entry.change_count != source.change_count {
                let mip_count = source.mips.len() as u32;
                if entry.width != source.width()
                    || entry.height != source.height()
                    || entry.mip_count != mip_count
                {
                    let replaced = create_and_upload(device, source, variant)?;
                    self.retired.push(entry.texture);
                    *entry = replaced;
                } else {
                    upload_mips(device, entry.texture, source, variant);
                    entry.change_count = source.change_count;
                }
                self.uploads += 1;
            }
        }

        Ok(Some(entry.texture))
    }

    /// Push a sub-rectangle of mip 0 to the unmasked entry for `source`.
    ///
    /// Does nothing if the texture was never uploaded unmasked. Clears the
    /// host's pending-change flag.
    pub fn update_rect<D: GpuDevice>(
        &mut self,
        device: &mut D,
        source: &mut TextureSource,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) {
        let Some(entry) = self.tables[CacheVariant::Unmasked as usize].get(&source.cache_id)
        else {
            return;
        };
        if let Some((region, texels)) = source.convert_rect(x, y, width, height, false) {
            device.upload_texture(entry.texture, region, &texels);
        }
        source.realtime_changed = false;
    }

    /// Destroy retired textures that `in_use` no longer reports as needed.
    pub fn release_retired<D: GpuDevice>(
        &mut self,
        device: &mut D,
        in_use: impl Fn(GpuTextureId) -> bool,
    ) {
        self.retired.retain(|&texture| {
            if in_use(texture) {
                return true;
            }
            device.destroy_texture(texture);
            false
        });
    }

    /// Textures waiting for [`release_retired`](Self::release_retired).
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Destroy every cached and retired texture.
    pub fn clear<D: GpuDevice>(&mut self, device: &mut D) {
        let mut destroyed = 0;
        for texture in self.retired.drain(..) {
            device.destroy_texture(texture);
            destroyed += 1;
        }
        for table in &mut self.tables {
            for (_, entry) in table.drain() {
                device.destroy_texture(entry.texture);
                destroyed += 1;
            }
        }
        if destroyed > 0 {
            tracing::debug!("Cleared texture cache ({} textures)", destroyed);
        }
    }

    /// The 1x1 opaque white texture bound in place of missing textures.
    pub fn null_texture<D: GpuDevice>(&mut self, device: &mut D) -> Result<GpuTextureId, DeviceError> {
        if let Some(texture) = self.null_texture {
            return Ok(texture);
        }

        let texture = device.create_texture(1, 1, 1)?;
        device.upload_texture(
            texture,
            TextureRegion {
                mip_level: 0,
                x: 0,
                y: 0,
                width: 1,
                height: 1,
            },
            &[255, 255, 255, 255],
        );
        tracing::debug!("Created null texture");
        self.null_texture = Some(texture);
        Ok(texture)
    }

    /// Cached textures across both variants.
    pub fn len(&self) -> usize {
        self.tables.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, cache_id: u64, variant: CacheVariant) -> bool {
        self.tables[variant as usize].contains_key(&cache_id)
    }

    /// Cached counter for an entry, if present.
    pub fn cached_change_count(&self, cache_id: u64, variant: CacheVariant) -> Option<u32> {
        self.tables[variant as usize]
            .get(&cache_id)
            .map(|entry| entry.change_count)
    }

    /// Full uploads performed since creation.
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }
}

fn create_and_upload<D: GpuDevice>(
    device: &mut D,
    source: &TextureSource,
    variant: CacheVariant,
) -> Result<CachedTexture, DeviceError> {
    let mip_count = source.mips.len() as u32;
    let texture = device.create_texture(source.width(), source.height(), mip_count)?;
    upload_mips(device, texture, source, variant);

    tracing::debug!(
        "Uploaded texture {:#x}: {}x{}, {} mips, masked={}",
        source.cache_id,
        source.width(),
        source.height(),
        mip_count,
        variant.is_masked()
    );

    Ok(CachedTexture {
        texture,
        width: source.width(),
        height: source.height(),
        mip_count,
        change_count: source.change_count,
    })
}

fn upload_mips<D: GpuDevice>(
    device: &mut D,
    texture: GpuTextureId,
    source: &TextureSource,
    variant: CacheVariant,
) {
    for (level, mip) in source.mips.iter().enumerate() {
        let texels = source.convert_mip(level, variant.is_masked());
        device.upload_texture(
            texture,
            TextureRegion {
                mip_level: level as u32,
                x: 0,
                y: 0,
                width: mip.width,
                height: mip.height,
            },
            &texels,
        );
    }
}
