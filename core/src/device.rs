//! The GPU seam
//!
//! Everything the batching engine needs from a graphics API goes through
//! [`GpuDevice`]. Resources are referred to by small integer ids owned by the
//! device, so the engine never holds API objects directly.

use thiserror::Error;

use crate::batch::SamplerMode;
use crate::geometry::SceneVertex;
use crate::pipeline::PipelineDesc;
use crate::scene::SceneProjection;

/// Device-side texture id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GpuTextureId(pub u32);

/// Device-side pipeline id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GpuPipelineId(pub u32);

/// Fatal device failures.
///
/// These abort initialization or a resolution change. Soft per-frame problems
/// never surface as a `DeviceError`.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to create {width}x{height} texture: {reason}")]
    TextureCreation {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("failed to create pipeline {index}: {reason}")]
    PipelineCreation { index: usize, reason: String },
    #[error("failed to map geometry buffers")]
    MapFailed,
    #[error("failed to allocate render targets: {0}")]
    TargetAllocation(String),
}

/// How the geometry buffers are mapped for writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Previous contents may be thrown away. Used once per frame.
    Discard,
    /// Contents already submitted must be left intact. New writes only
    /// land past the previous cursor.
    NoOverwrite,
}

/// A rectangle of one mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRegion {
    pub mip_level: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Geometry appended since the buffers were last mapped.
///
/// `first_vertex` and `first_index` are element offsets into the device
/// buffers. Ranges never overlap data handed over earlier in the frame.
#[derive(Debug, Clone, Copy)]
pub struct GeometryUpload<'a> {
    pub first_vertex: u32,
    pub vertices: &'a [SceneVertex],
    pub first_index: u32,
    pub indices: &'a [u32],
}

impl GeometryUpload<'_> {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }
}

/// One indexed draw with fully resolved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub pipeline: GpuPipelineId,
    /// Primary, lightmap, macro, detail-or-fog. Unbound slots already hold
    /// the null texture.
    pub textures: [GpuTextureId; 4],
    pub sampler: SamplerMode,
    pub first_index: u32,
    pub index_count: u32,
}

/// Parameters of the tone-mapping pass run at present time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresentParams {
    pub inv_gamma: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub gray_formula: u32,
    pub vsync: bool,
}

/// The scene color target read back as half floats, RGBA, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfImage {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<half::f16>,
}

/// Graphics API operations used by the batching engine.
pub trait GpuDevice {
    /// Allocate an RGBA8 texture with `mip_count` levels.
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        mip_count: u32,
    ) -> Result<GpuTextureId, DeviceError>;

    /// Write tightly packed RGBA8 texels into a texture region.
    fn upload_texture(&mut self, texture: GpuTextureId, region: TextureRegion, rgba: &[u8]);

    fn destroy_texture(&mut self, texture: GpuTextureId);

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<GpuPipelineId, DeviceError>;

    /// Start a frame: clear color to opaque black and depth to 1.
    fn begin_frame(&mut self) -> Result<(), DeviceError>;

    /// Map the vertex and index buffers for writing.
    fn map_geometry(&mut self, mode: MapMode) -> Result<(), DeviceError>;

    /// Unmap the buffers, committing what was written since the last map.
    fn unmap_geometry(&mut self, upload: GeometryUpload<'_>);

    fn draw_indexed(&mut self, draw: &DrawCall);

    fn clear_depth(&mut self);

    /// Switch viewport and projection for subsequent draws.
    fn set_projection(&mut self, projection: &SceneProjection);

    /// Resolve the scene, run the present pass and show the frame.
    fn present(&mut self, params: &PresentParams) -> Result<(), DeviceError>;

    /// Read back the resolved scene image. `None` when nothing can be read.
    fn read_pixels(&mut self) -> Option<HalfImage>;

    /// Reallocate scene targets for a new output size.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let error = DeviceError::TextureCreation {
            width: 8192,
            height: 16,
            reason: "size must be within 1..=4096".into(),
        };
        assert_eq!(
            error.to_string(),
            "failed to create 8192x16 texture: size must be within 1..=4096"
        );
        assert_eq!(
            DeviceError::PipelineCreation {
                index: 3,
                reason: "bad blend".into()
            }
            .to_string(),
            "failed to create pipeline 3: bad blend"
        );
        assert_eq!(DeviceError::MapFailed.to_string(), "failed to map geometry buffers");
    }
}
