//! Screen-space tiles (HUD, canvas drawing).

use glam::Vec4;

use crate::flags::PolyFlags;
use crate::geometry::SceneVertex;
use crate::texture::{CacheVariant, PixelFormat, TextureSource};

use super::{BuildContext, PreparedPrimitive, PrimitiveGeometry, PrimitiveKind, TextureRequest};

/// A textured rectangle in viewport pixels at depth `z`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tile {
    pub x: f32,
    pub y: f32,
    pub xl: f32,
    pub yl: f32,
    /// Source rectangle in texels
    pub u: f32,
    pub v: f32,
    pub ul: f32,
    pub vl: f32,
    pub z: f32,
    pub color: Vec4,
}

pub(super) fn prepare<'a>(
    texture: &'a mut TextureSource,
    tile: &Tile,
    mut flags: PolyFlags,
    ctx: &BuildContext<'_>,
    out: &mut PrimitiveGeometry,
) -> PreparedPrimitive<'a> {
    // Palettized modulation tiles ignore every other state bit
    if flags.contains(PolyFlags::MODULATED) && texture.format == PixelFormat::P8 {
        flags = PolyFlags::MODULATED;
    }

    let color = if flags.contains(PolyFlags::MODULATED) {
        SceneVertex::WHITE
    } else {
        [tile.color.x, tile.color.y, tile.color.z, 1.0]
    };

    let (mut x, mut y, mut xl, mut yl) = (tile.x, tile.y, tile.xl, tile.yl);
    if ctx.pixel_snap {
        let right = (x + xl + 0.5).floor();
        let bottom = (y + yl + 0.5).floor();
        x = (x + 0.5).floor();
        y = (y + 0.5).floor();
        xl = right - x;
        yl = bottom - y;
    }

    let p = ctx.projection;
    let z = tile.z;
    let left = p.rfx2 * z * (x - p.fx2);
    let right = p.rfx2 * z * (x + xl - p.fx2);
    let top = p.rfy2 * z * (y - p.fy2);
    let bottom = p.rfy2 * z * (y + yl - p.fy2);

    let u_mult = texture.u_mult();
    let v_mult = texture.v_mult();
    let u0 = tile.u * u_mult;
    let u1 = (tile.u + tile.ul) * u_mult;
    let v0 = tile.v * v_mult;
    let v1 = (tile.v + tile.vl) * v_mult;

    let corner = |px: f32, py: f32, s: f32, t: f32| SceneVertex {
        flags: 0,
        pos: [px, py, z],
        tex: [s, t],
        color,
        ..Default::default()
    };
    out.push_polygon([
        corner(left, top, u0, v0),
        corner(right, top, u1, v0),
        corner(right, bottom, u1, v1),
        corner(left, bottom, u0, v1),
    ]);

    PreparedPrimitive {
        kind: PrimitiveKind::Tile,
        flags,
        clamp: true,
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
