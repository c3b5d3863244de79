//! Shared test utilities for unit tests
//!
//! [`RecordingDevice`] implements [`GpuDevice`] without a GPU. It records
//! every call, emulates the geometry buffers and can be told to fail.

use hashbrown::HashMap;

use crate::device::{
    DeviceError, DrawCall, GeometryUpload, GpuDevice, GpuPipelineId, GpuTextureId, HalfImage,
    MapMode, PresentParams, TextureRegion,
};
use crate::geometry::SceneVertex;
use crate::pipeline::PipelineDesc;
use crate::scene::SceneProjection;
use crate::texture::{MipLevel, PixelFormat, TextureSource};

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateTexture {
        texture: GpuTextureId,
        width: u32,
        height: u32,
    },
    UploadTexture {
        texture: GpuTextureId,
        region: TextureRegion,
    },
    DestroyTexture(GpuTextureId),
    BeginFrame,
    Map(MapMode),
    Unmap {
        first_vertex: u32,
        vertex_count: usize,
        first_index: u32,
        index_count: usize,
    },
    Draw(DrawCall),
    ClearDepth,
    SetProjection(SceneProjection),
    Present(PresentParams),
    Resize(u32, u32),
}

/// Test graphics device (records calls, no GPU)
#[derive(Default)]
pub struct RecordingDevice {
    pub calls: Vec<DeviceCall>,
    pub pipelines: Vec<PipelineDesc>,
    /// Live textures and their last uploaded texels per mip 0 region
    pub textures: HashMap<GpuTextureId, Vec<u8>>,
    /// Emulated device vertex buffer
    pub vertices: Vec<SceneVertex>,
    /// Emulated device index buffer
    pub indices: Vec<u32>,
    /// Solid color returned by `read_pixels`
    pub fill_color: [f32; 4],
    pub size: (u32, u32),
    /// Fail every `map_geometry` with this mode
    pub fail_map: Option<MapMode>,
    /// Fail pipeline creation at this table index
    pub fail_pipeline: Option<usize>,
    next_texture: u32,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            size: (64, 32),
            ..Default::default()
        }
    }

    pub fn draws(&self) -> Vec<DrawCall> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    pub fn uploads_to(&self, texture: GpuTextureId) -> usize {
        self.count(|call| matches!(call, DeviceCall::UploadTexture { texture: t, .. } if *t == texture))
    }

    /// Indices of a draw resolved against the emulated buffers, as vertices.
    pub fn draw_vertices(&self, draw: &DrawCall) -> Vec<SceneVertex> {
        let start = draw.first_index as usize;
        self.indices[start..start + draw.index_count as usize]
            .iter()
            .map(|&i| self.vertices[i as usize])
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl GpuDevice for RecordingDevice {
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        _mip_count: u32,
    ) -> Result<GpuTextureId, DeviceError> {
        self.next_texture += 1;
        let texture = GpuTextureId(self.next_texture);
        self.textures.insert(texture, Vec::new());
        self.calls.push(DeviceCall::CreateTexture {
            texture,
            width,
            height,
        });
        Ok(texture)
    }

    fn upload_texture(&mut self, texture: GpuTextureId, region: TextureRegion, rgba: &[u8]) {
        if region.mip_level == 0 {
            self.textures.insert(texture, rgba.to_vec());
        }
        self.calls.push(DeviceCall::UploadTexture { texture, region });
    }

    fn destroy_texture(&mut self, texture: GpuTextureId) {
        self.textures.remove(&texture);
        self.calls.push(DeviceCall::DestroyTexture(texture));
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<GpuPipelineId, DeviceError> {
        let index = desc.key.index();
        if self.fail_pipeline == Some(index) {
            return Err(DeviceError::PipelineCreation {
                index,
                reason: "injected".into(),
            });
        }
        self.pipelines.push(*desc);
        Ok(GpuPipelineId(100 + index as u32))
    }

    fn begin_frame(&mut self) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::BeginFrame);
        Ok(())
    }

    fn map_geometry(&mut self, mode: MapMode) -> Result<(), DeviceError> {
        if self.fail_map == Some(mode) {
            return Err(DeviceError::MapFailed);
        }
        if mode == MapMode::Discard {
            self.vertices.clear();
            self.indices.clear();
        }
        self.calls.push(DeviceCall::Map(mode));
        Ok(())
    }

    fn unmap_geometry(&mut self, upload: GeometryUpload<'_>) {
        // Writes must land exactly at the end of what was committed before
        assert_eq!(upload.first_vertex as usize, self.vertices.len());
        assert_eq!(upload.first_index as usize, self.indices.len());
        self.vertices.extend_from_slice(upload.vertices);
        self.indices.extend_from_slice(upload.indices);
        self.calls.push(DeviceCall::Unmap {
            first_vertex: upload.first_vertex,
            vertex_count: upload.vertices.len(),
            first_index: upload.first_index,
            index_count: upload.indices.len(),
        });
    }

    fn draw_indexed(&mut self, draw: &DrawCall) {
        self.calls.push(DeviceCall::Draw(*draw));
    }

    fn clear_depth(&mut self) {
        self.calls.push(DeviceCall::ClearDepth);
    }

    fn set_projection(&mut self, projection: &SceneProjection) {
        self.calls.push(DeviceCall::SetProjection(*projection));
    }

    fn present(&mut self, params: &PresentParams) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::Present(*params));
        Ok(())
    }

    fn read_pixels(&mut self) -> Option<HalfImage> {
        let (width, height) = self.size;
        let texel = self.fill_color.map(half::f16::from_f32);
        Some(HalfImage {
            width,
            height,
            texels: texel.repeat((width * height) as usize),
        })
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        self.size = (width, height);
        self.calls.push(DeviceCall::Resize(width, height));
        Ok(())
    }
}

/// Solid RGBA8 texture of the given size.
pub fn solid_texture(cache_id: u64, width: u32, height: u32, rgba: [u8; 4]) -> TextureSource {
    TextureSource::rgba8(cache_id, width, height, rgba.repeat((width * height) as usize))
}

/// 2x2 palettized texture using palette indices 0..4.
pub fn palette_texture(cache_id: u64) -> TextureSource {
    TextureSource::new(
        cache_id,
        PixelFormat::P8,
        vec![MipLevel {
            width: 2,
            height: 2,
            data: vec![0, 1, 2, 3],
        }],
    )
    .with_palette(vec![
        [10, 20, 30, 255],
        [255, 0, 0, 255],
        [0, 255, 0, 255],
        [0, 0, 255, 255],
    ])
}
