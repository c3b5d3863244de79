//! Vertex format shared by every scene pipeline.

use bytemuck::{Pod, Zeroable};

/// One scene vertex, 64 bytes.
///
/// `flags` tells the shader how to interpret the extra texture coordinate
/// sets (see the associated constants).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct SceneVertex {
    pub flags: u32,
    pub pos: [f32; 3],
    pub tex: [f32; 2],
    pub tex2: [f32; 2],
    pub tex3: [f32; 2],
    pub tex4: [f32; 2],
    pub color: [f32; 4],
}

impl SceneVertex {
    /// Slot 1 holds a lightmap
    pub const LIGHTMAP: u32 = 1;
    /// Slot 2 holds a macro texture
    pub const MACRO: u32 = 2;
    /// Slot 3 holds a detail texture
    pub const DETAIL: u32 = 4;
    /// Slot 3 holds a fog map
    pub const FOG_MAP: u32 = 8;
    /// Per-vertex fog color is carried in tex2/tex3
    pub const VERTEX_FOG: u32 = 16;
    /// Brighter actor lighting blend
    pub const ACTOR_X_BLEND: u32 = 32;
    /// Lightmaps are not doubled
    pub const ONE_X_BLEND: u32 = 64;

    pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
}

/// Index count for a fan over `point_count` points (zero below three).
pub fn fan_index_count(point_count: usize) -> usize {
    point_count.saturating_sub(2) * 3
}

/// Triangulate a convex polygon as a fan around its first point.
///
/// Emits `(0, i - 1, i)` for each `i` in `2..point_count`, offset by `base`.
pub fn fan_indices(base: u32, point_count: usize) -> impl Iterator<Item = u32> {
    (2..point_count as u32).flat_map(move |i| [base, base + i - 1, base + i])
}
