//! Lightmapped world surfaces.

use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use crate::batch::slot;
use crate::flags::PolyFlags;
use crate::geometry::SceneVertex;
use crate::texture::{CacheVariant, TextureSource};

use super::{BuildContext, PreparedPrimitive, PrimitiveGeometry, PrimitiveKind, TextureRequest};

/// Points of one convex polygon.
pub type Polygon = SmallVec<[Vec3; 8]>;

/// Texture mapping frame of a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapCoords {
    pub origin: Vec3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
}

/// The polygons of one surface and their texture mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    pub map_coords: MapCoords,
    pub polys: Vec<Polygon>,
}

/// Textures and flags of a world surface.
#[derive(Default)]
pub struct SurfaceInfo<'a> {
    pub flags: PolyFlags,
    pub texture: Option<&'a mut TextureSource>,
    pub lightmap: Option<&'a mut TextureSource>,
    pub macro_texture: Option<&'a mut TextureSource>,
    pub detail_texture: Option<&'a mut TextureSource>,
    pub fog_map: Option<&'a mut TextureSource>,
}

/// Planar mapping of one texture layer: `(axis . p - pan) * mult`.
#[derive(Debug, Clone, Copy, Default)]
struct LayerMapping {
    pan: Vec2,
    mult: Vec2,
}

impl LayerMapping {
    fn new(source: Option<&TextureSource>, dot: Vec2, half_texel_offset: bool) -> Self {
        let Some(source) = source else {
            return Self::default();
        };
        let mut pan = dot + source.pan;
        if half_texel_offset {
            pan -= 0.5 * source.scale;
        }
        Self {
            pan,
            mult: Vec2::new(source.u_mult(), source.v_mult()),
        }
    }

    fn map(&self, uv: Vec2) -> [f32; 2] {
        ((uv - self.pan) * self.mult).to_array()
    }
}

pub(super) fn prepare<'a>(
    surface: SurfaceInfo<'a>,
    facet: &Facet,
    ctx: &BuildContext<'_>,
    out: &mut PrimitiveGeometry,
) -> PreparedPrimitive<'a> {
    let SurfaceInfo {
        flags,
        texture,
        lightmap,
        macro_texture,
        mut detail_texture,
        fog_map,
    } = surface;

    // A fog map takes the detail slot
    if fog_map.is_some() || !ctx.detail_textures {
        detail_texture = None;
    }

    let coords = &facet.map_coords;
    let dot = Vec2::new(coords.x_axis.dot(coords.origin), coords.y_axis.dot(coords.origin));

    let base = LayerMapping::new(texture.as_deref(), dot, false);
    let light = LayerMapping::new(lightmap.as_deref(), dot, true);
    let macro_layer = LayerMapping::new(macro_texture.as_deref(), dot, false);
    let detail = match fog_map.as_deref() {
        Some(fog) => LayerMapping::new(Some(fog), dot, true),
        None => LayerMapping::new(detail_texture.as_deref(), dot, false),
    };

    let mut vertex_flags = 0;
    if lightmap.is_some() {
        vertex_flags |= SceneVertex::LIGHTMAP;
    }
    if macro_texture.is_some() {
        vertex_flags |= SceneVertex::MACRO;
    }
    if detail_texture.is_some() {
        vertex_flags |= SceneVertex::DETAIL;
    }
    if fog_map.is_some() {
        vertex_flags |= SceneVertex::FOG_MAP;
    }
    if ctx.one_x_blending {
        vertex_flags |= SceneVertex::ONE_X_BLEND;
    }

    for poly in &facet.polys {
        out.push_polygon(poly.iter().map(|&point| {
            let uv = Vec2::new(coords.x_axis.dot(point), coords.y_axis.dot(point));
            SceneVertex {
                flags: vertex_flags,
                pos: point.to_array(),
                tex: base.map(uv),
                tex2: light.map(uv),
                tex3: macro_layer.map(uv),
                tex4: detail.map(uv),
                color: SceneVertex::WHITE,
            }
        }));
    }

    let variant = CacheVariant::from_masked(flags.contains(PolyFlags::MASKED));
    let mut textures: [Option<TextureRequest<'a>>; 4] = Default::default();
    textures[slot::PRIMARY] = texture.map(|source| TextureRequest { source, variant });
    textures[slot::LIGHTMAP] = lightmap.map(TextureRequest::unmasked);
    textures[slot::MACRO] = macro_texture.map(TextureRequest::unmasked);
    textures[slot::DETAIL_OR_FOG] = fog_map.or(detail_texture).map(TextureRequest::unmasked);

    PreparedPrimitive {
        kind: PrimitiveKind::Surface,
        flags,
        clamp: false,
        textures,
    }
}
