//! Gouraud-shaded polygons (meshes, sprites, particles).

use glam::{Vec3, Vec4};

use crate::flags::PolyFlags;
use crate::geometry::SceneVertex;
use crate::texture::{CacheVariant, TextureSource};

use super::{BuildContext, PreparedPrimitive, PrimitiveGeometry, PrimitiveKind, TextureRequest};

/// A transformed, lit polygon point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransTexture {
    pub point: Vec3,
    /// Texture coordinates in texels
    pub u: f32,
    pub v: f32,
    pub light: Vec3,
    pub fog: Vec4,
}

pub(super) fn prepare<'a>(
    texture: &'a mut TextureSource,
    points: &[TransTexture],
    flags: PolyFlags,
    ctx: &BuildContext<'_>,
    out: &mut PrimitiveGeometry,
) -> PreparedPrimitive<'a> {
    let mut vertex_flags = 0;
    if flags & (PolyFlags::RENDER_FOG | PolyFlags::TRANSLUCENT | PolyFlags::MODULATED)
        == PolyFlags::RENDER_FOG
    {
        vertex_flags |= SceneVertex::VERTEX_FOG;
    }
    if flags.is_opaque_blend() && ctx.actor_x_blending {
        vertex_flags |= SceneVertex::ACTOR_X_BLEND;
    }

    let modulated = flags.contains(PolyFlags::MODULATED);
    let u_mult = texture.u_mult();
    let v_mult = texture.v_mult();

    out.push_polygon(points.iter().map(|p| SceneVertex {
        flags: vertex_flags,
        pos: p.point.to_array(),
        tex: [p.u * u_mult, p.v * v_mult],
        tex2: [p.fog.x, p.fog.y],
        tex3: [p.fog.z, p.fog.w],
        tex4: [0.0; 2],
        color: if modulated {
            SceneVertex::WHITE
        } else {
            p.light.extend(1.0).to_array()
        },
    }));

    PreparedPrimitive {
        kind: PrimitiveKind::Gouraud,
        flags,
        clamp: false,
        textures: [
            Some(TextureRequest {
                source: texture,
                variant: CacheVariant::from_masked(flags.contains(PolyFlags::MASKED)),
            }),
            None,
            None,
            None,
        ],
    }
}
