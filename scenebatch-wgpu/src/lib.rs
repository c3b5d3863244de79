//! SceneBatch wgpu backend
//!
//! [`WgpuDevice`] implements the core [`GpuDevice`](scenebatch_core::GpuDevice)
//! seam on top of wgpu:
//!
//! - Scene targets: HDR color (optionally multisampled), depth, the
//!   post-process image and the presented output
//! - The 32 scene pipelines built from backend-neutral descriptions
//! - Texture storage, samplers and cached texture bind groups
//! - Vertex/index buffers written at the engine's cursor offsets
//! - Recorded draws replayed into render passes at present time
//! - The present pass (color grading, gamma, ordered dither)
//! - Synchronous readback of the scene and output images

mod commands;
mod context;
mod device;
mod pipelines;
mod present;
mod readback;
mod samplers;
mod screenshot;
mod targets;
mod textures;

pub use context::GpuContext;
pub use device::{WgpuDevice, device_viewport};
pub use present::{DITHER_MATRIX, PresentUniforms};
pub use readback::{ReadbackError, read_texture};
pub use screenshot::{ScreenshotError, save_png, save_rgba_png};
pub use targets::{OUTPUT_FORMAT, SCENE_COLOR_FORMAT, SCENE_DEPTH_FORMAT};
