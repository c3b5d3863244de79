//! SceneBatch Core - frame batching engine
//!
//! Turns a stream of immediate-mode scene primitives into a small number of
//! batched, indexed GPU draws. The engine is backend-agnostic: it talks to the
//! graphics API only through [`GpuDevice`].
//!
//! # Architecture
//!
//! - [`TextureCache`] - Uploads host textures once per (identity, masked variant)
//! - [`PipelineTable`] - 32 fixed pipelines selected by polygon flags
//! - [`GeometryAllocator`] - Per-frame vertex/index buffers with append-only writers
//! - [`FrameState`] - Pure batch/frame state machine deciding when to submit
//! - [`Renderer`] - Frame orchestration driven by the host

pub mod batch;
pub mod config;
pub mod device;
pub mod flags;
pub mod frame;
pub mod geometry;
pub mod pipeline;
pub mod primitive;
pub mod readback;
pub mod scene;
pub mod stats;
#[cfg(test)]
pub mod test_utils;
pub mod texture;

// Re-export core types
pub use batch::{BatchState, FrameEvent, FrameState, SamplerMode};
pub use config::RendererConfig;
pub use device::{
    DeviceError, DrawCall, GeometryUpload, GpuDevice, GpuPipelineId, GpuTextureId, HalfImage,
    MapMode, PresentParams, TextureRegion,
};
pub use flags::PolyFlags;
pub use frame::{LockParams, Renderer};
pub use geometry::{GeometryAllocator, SceneVertex};
pub use pipeline::{PipelineDesc, PipelineKey, PipelineTable};
pub use primitive::{Facet, MapCoords, Primitive, SurfaceInfo, Tile, TransTexture};
pub use readback::ReadbackImage;
pub use scene::{SceneNode, SceneProjection, Viewport};
pub use stats::FrameStats;
pub use texture::{CacheVariant, MipLevel, PixelFormat, TextureCache, TextureSource};
