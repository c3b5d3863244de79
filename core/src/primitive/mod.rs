//! Host primitives and their conversion into scene geometry
//!
//! Each primitive kind turns into the same [`PreparedPrimitive`]: texture
//! requests per slot, effective flags and polygon-local geometry. The
//! renderer consumes that uniformly, so batching never branches on the kind.

mod gouraud;
mod surface;
mod tile;

use crate::flags::PolyFlags;
use crate::geometry::{SceneVertex, fan_indices};
use crate::scene::SceneProjection;
use crate::texture::{CacheVariant, TextureSource};

pub use gouraud::TransTexture;
pub use surface::{Facet, MapCoords, Polygon, SurfaceInfo};
pub use tile::Tile;

/// A draw request from the host.
pub enum Primitive<'a> {
    /// A lightmapped world surface made of one or more convex polygons
    Surface {
        surface: SurfaceInfo<'a>,
        facet: &'a Facet,
    },
    /// A single convex polygon with per-vertex light and fog
    Gouraud {
        texture: &'a mut TextureSource,
        points: &'a [TransTexture],
        flags: PolyFlags,
    },
    /// A screen-space rectangle
    Tile {
        texture: &'a mut TextureSource,
        tile: &'a Tile,
        flags: PolyFlags,
    },
}

/// Kind tag used for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Surface,
    Gouraud,
    Tile,
}

/// Settings that influence how primitives are built.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'p> {
    pub projection: &'p SceneProjection,
    /// Snap tile corners to whole pixels
    pub pixel_snap: bool,
    pub detail_textures: bool,
    pub one_x_blending: bool,
    pub actor_x_blending: bool,
}

/// A texture that must be resolved through the cache.
pub struct TextureRequest<'a> {
    pub source: &'a mut TextureSource,
    pub variant: CacheVariant,
}

impl<'a> TextureRequest<'a> {
    fn unmasked(source: &'a mut TextureSource) -> Self {
        Self {
            source,
            variant: CacheVariant::Unmasked,
        }
    }
}

/// Vertices plus polygon-local indices for one primitive.
///
/// Kept by the renderer and reused between primitives.
#[derive(Debug, Default)]
pub struct PrimitiveGeometry {
    pub vertices: Vec<SceneVertex>,
    pub indices: Vec<u32>,
}

impl PrimitiveGeometry {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Append one convex polygon, fan-triangulated.
    ///
    /// Polygons with fewer than three points add nothing.
    pub fn push_polygon(&mut self, vertices: impl IntoIterator<Item = SceneVertex>) {
        let base = self.vertices.len();
        self.vertices.extend(vertices);
        let count = self.vertices.len() - base;
        if count < 3 {
            self.vertices.truncate(base);
            return;
        }
        self.indices.extend(fan_indices(base as u32, count));
    }
}

/// Output of [`Primitive::prepare`].
pub struct PreparedPrimitive<'a> {
    pub kind: PrimitiveKind,
    /// Flags after any per-kind adjustment
    pub flags: PolyFlags,
    /// Clamp addressing on the primary texture
    pub clamp: bool,
    /// Primary, lightmap, macro, detail-or-fog
    pub textures: [Option<TextureRequest<'a>>; 4],
}

impl<'a> Primitive<'a> {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Surface { .. } => PrimitiveKind::Surface,
            Self::Gouraud { .. } => PrimitiveKind::Gouraud,
            Self::Tile { .. } => PrimitiveKind::Tile,
        }
    }

    /// Build geometry into `out` and describe the state the primitive needs.
    pub fn prepare(
        self,
        ctx: &BuildContext<'_>,
        out: &mut PrimitiveGeometry,
    ) -> PreparedPrimitive<'a> {
        out.clear();
        match self {
            Self::Surface { surface, facet } => surface::prepare(surface, facet, ctx, out),
            Self::Gouraud {
                texture,
                points,
                flags,
            } => gouraud::prepare(texture, points, flags, ctx, out),
            Self::Tile {
                texture,
                tile,
                flags,
            } => tile::prepare(texture, tile, flags, ctx, out),
        }
    }
}

#[cfg(test)]
mod tests;
