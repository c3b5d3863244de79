//! Scene vertex layout and the per-frame geometry buffers.

mod allocator;
mod vertex;

pub use allocator::{GeometryAllocator, GeometryWriter};
pub use vertex::{SceneVertex, fan_indices, fan_index_count};
