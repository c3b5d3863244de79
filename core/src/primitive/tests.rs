//! Tests for primitive geometry

use glam::{Vec2, Vec3, Vec4};
use smallvec::smallvec;

use super::*;
use crate::batch::slot;
use crate::scene::SceneNode;
use crate::test_utils::{palette_texture, solid_texture};

fn context(projection: &SceneProjection) -> BuildContext<'_> {
    BuildContext {
        projection,
        pixel_snap: false,
        detail_textures: true,
        one_x_blending: false,
        actor_x_blending: false,
    }
}

fn projection() -> SceneProjection {
    SceneProjection::from_node(&SceneNode::full(640, 480, 90.0), 480)
}

fn floor_facet() -> Facet {
    Facet {
        map_coords: MapCoords {
            origin: Vec3::ZERO,
            x_axis: Vec3::X,
            y_axis: Vec3::Y,
        },
        polys: vec![
            smallvec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(64.0, 0.0, 0.0),
                Vec3::new(64.0, 64.0, 0.0),
                Vec3::new(0.0, 64.0, 0.0),
            ],
            // Degenerate polygon contributes nothing
            smallvec![Vec3::ZERO, Vec3::X],
        ],
    }
}

fn point(x: f32, y: f32, u: f32, v: f32) -> TransTexture {
    TransTexture {
        point: Vec3::new(x, y, 10.0),
        u,
        v,
        light: Vec3::new(0.25, 0.5, 0.75),
        fog: Vec4::new(0.1, 0.2, 0.3, 0.4),
    }
}

#[test]
fn test_surface_fan_and_uvs() {
    let p = projection();
    let mut texture = solid_texture(1, 64, 64, [255; 4]);
    let mut lightmap = solid_texture(2, 8, 8, [128; 4]);
    lightmap.scale = Vec2::splat(8.0);
    let facet = floor_facet();

    let mut out = PrimitiveGeometry::default();
    let prepared = Primitive::Surface {
        surface: SurfaceInfo {
            flags: PolyFlags::empty(),
            texture: Some(&mut texture),
            lightmap: Some(&mut lightmap),
            ..Default::default()
        },
        facet: &facet,
    }
    .prepare(&context(&p), &mut out);

    assert_eq!(prepared.kind, PrimitiveKind::Surface);
    assert_eq!(out.vertices.len(), 4);
    assert_eq!(out.indices, vec![0, 1, 2, 0, 2, 3]);
    assert_eq!(out.vertices[2].tex, [1.0, 1.0]);
    // Lightmap: (64 - (-0.5 * 8)) / (8 * 8)
    assert_eq!(out.vertices[2].tex2, [68.0 / 64.0, 68.0 / 64.0]);
    assert_eq!(out.vertices[0].flags, SceneVertex::LIGHTMAP);
    assert_eq!(out.vertices[0].color, SceneVertex::WHITE);
    assert!(prepared.textures[slot::PRIMARY].is_some());
    assert!(prepared.textures[slot::LIGHTMAP].is_some());
    assert!(prepared.textures[slot::DETAIL_OR_FOG].is_none());
}

#[test]
fn test_fog_map_replaces_detail() {
    let p = projection();
    let mut detail = solid_texture(3, 4, 4, [0; 4]);
    let mut fog = solid_texture(4, 4, 4, [0; 4]);
    let facet = floor_facet();

    let mut out = PrimitiveGeometry::default();
    let prepared = Primitive::Surface {
        surface: SurfaceInfo {
            detail_texture: Some(&mut detail),
            fog_map: Some(&mut fog),
            ..Default::default()
        },
        facet: &facet,
    }
    .prepare(&context(&p), &mut out);

    assert_eq!(out.vertices[0].flags, SceneVertex::FOG_MAP);
    let request = prepared.textures[slot::DETAIL_OR_FOG].as_ref().unwrap();
    assert_eq!(request.source.cache_id, 4);
}

#[test]
fn test_detail_textures_can_be_disabled() {
    let p = projection();
    let mut ctx = context(&p);
    ctx.detail_textures = false;
    ctx.one_x_blending = true;
    let mut detail = solid_texture(3, 4, 4, [0; 4]);
    let facet = floor_facet();

    let mut out = PrimitiveGeometry::default();
    let prepared = Primitive::Surface {
        surface: SurfaceInfo {
            detail_texture: Some(&mut detail),
            ..Default::default()
        },
        facet: &facet,
    }
    .prepare(&ctx, &mut out);

    assert_eq!(out.vertices[0].flags, SceneVertex::ONE_X_BLEND);
    assert!(prepared.textures[slot::DETAIL_OR_FOG].is_none());
}

#[test]
fn test_masked_surface_requests_masked_variant() {
    let p = projection();
    let mut texture = palette_texture(1);
    let facet = floor_facet();
    let mut out = PrimitiveGeometry::default();
    let prepared = Primitive::Surface {
        surface: SurfaceInfo {
            flags: PolyFlags::MASKED,
            texture: Some(&mut texture),
            ..Default::default()
        },
        facet: &facet,
    }
    .prepare(&context(&p), &mut out);

    let request = prepared.textures[slot::PRIMARY].as_ref().unwrap();
    assert_eq!(request.variant, CacheVariant::Masked);
}

#[test]
fn test_gouraud_light_and_fog() {
    let p = projection();
    let mut texture = solid_texture(1, 32, 32, [0; 4]);
    let points = [
        point(0.0, 0.0, 0.0, 0.0),
        point(1.0, 0.0, 32.0, 0.0),
        point(1.0, 1.0, 32.0, 16.0),
    ];

    let mut out = PrimitiveGeometry::default();
    Primitive::Gouraud {
        texture: &mut texture,
        points: &points,
        flags: PolyFlags::RENDER_FOG,
    }
    .prepare(&context(&p), &mut out);

    assert_eq!(out.indices, vec![0, 1, 2]);
    let v = out.vertices[2];
    assert_eq!(v.flags, SceneVertex::VERTEX_FOG);
    assert_eq!(v.tex, [1.0, 0.5]);
    assert_eq!(v.tex2, [0.1, 0.2]);
    assert_eq!(v.tex3, [0.3, 0.4]);
    assert_eq!(v.color, [0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn test_gouraud_modulated_is_white_without_fog() {
    let p = projection();
    let mut ctx = context(&p);
    ctx.actor_x_blending = true;
    let mut texture = solid_texture(1, 32, 32, [0; 4]);
    let points = [point(0.0, 0.0, 0.0, 0.0); 3];

    let mut out = PrimitiveGeometry::default();
    Primitive::Gouraud {
        texture: &mut texture,
        points: &points,
        flags: PolyFlags::MODULATED | PolyFlags::RENDER_FOG,
    }
    .prepare(&ctx, &mut out);
    assert_eq!(out.vertices[0].flags, 0);
    assert_eq!(out.vertices[0].color, SceneVertex::WHITE);

    Primitive::Gouraud {
        texture: &mut texture,
        points: &points,
        flags: PolyFlags::empty(),
    }
    .prepare(&ctx, &mut out);
    assert_eq!(out.vertices.len(), 3);
    assert_eq!(out.vertices[0].flags, SceneVertex::ACTOR_X_BLEND);
}

#[test]
fn test_two_point_polygon_is_dropped() {
    let p = projection();
    let mut texture = solid_texture(1, 32, 32, [0; 4]);
    let points = [point(0.0, 0.0, 0.0, 0.0), point(1.0, 0.0, 0.0, 0.0)];
    let mut out = PrimitiveGeometry::default();
    Primitive::Gouraud {
        texture: &mut texture,
        points: &points,
        flags: PolyFlags::empty(),
    }
    .prepare(&context(&p), &mut out);
    assert!(out.is_empty());
    assert!(out.vertices.is_empty());
}

#[test]
fn test_tile_projection() {
    let p = projection();
    let mut texture = solid_texture(1, 16, 16, [0; 4]);
    let tile = Tile {
        x: 320.0,
        y: 240.0,
        xl: 64.0,
        yl: 32.0,
        u: 0.0,
        v: 0.0,
        ul: 16.0,
        vl: 8.0,
        z: 2.0,
        color: Vec4::new(0.5, 0.25, 1.0, 0.0),
    };

    let mut out = PrimitiveGeometry::default();
    let prepared = Primitive::Tile {
        texture: &mut texture,
        tile: &tile,
        flags: PolyFlags::NO_SMOOTH,
    }
    .prepare(&context(&p), &mut out);

    assert!(prepared.clamp);
    assert_eq!(out.indices.len(), 6);
    assert_eq!(out.vertices[0].pos, [0.0, 0.0, 2.0]);
    let right = p.rfx2 * 2.0 * 64.0;
    let bottom = p.rfy2 * 2.0 * 32.0;
    assert_eq!(out.vertices[2].pos, [right, bottom, 2.0]);
    assert_eq!(out.vertices[2].tex, [1.0, 0.5]);
    assert_eq!(out.vertices[0].color, [0.5, 0.25, 1.0, 1.0]);
}

#[test]
fn test_tile_pixel_snap() {
    let p = projection();
    let mut ctx = context(&p);
    ctx.pixel_snap = true;
    let mut texture = solid_texture(1, 16, 16, [0; 4]);
    let tile = Tile {
        x: 320.4,
        y: 240.6,
        xl: 10.2,
        yl: 10.0,
        z: 1.0,
        ..Default::default()
    };

    let mut out = PrimitiveGeometry::default();
    Primitive::Tile {
        texture: &mut texture,
        tile: &tile,
        flags: PolyFlags::empty(),
    }
    .prepare(&ctx, &mut out);

    // x snaps to 320, right edge to 331, y to 241, bottom to 251
    assert_eq!(out.vertices[0].pos[0], 0.0);
    assert_eq!(out.vertices[1].pos[0], p.rfx2 * 11.0);
    assert_eq!(out.vertices[0].pos[1], p.rfy2 * 1.0);
    assert_eq!(out.vertices[2].pos[1], p.rfy2 * 11.0);
}

#[test]
fn test_palettized_modulated_tile_drops_other_flags() {
    let p = projection();
    let mut texture = palette_texture(1);
    let tile = Tile {
        xl: 1.0,
        yl: 1.0,
        z: 1.0,
        ..Default::default()
    };
    let mut out = PrimitiveGeometry::default();
    let prepared = Primitive::Tile {
        texture: &mut texture,
        tile: &tile,
        flags: PolyFlags::MODULATED | PolyFlags::MASKED | PolyFlags::NO_SMOOTH,
    }
    .prepare(&context(&p), &mut out);

    assert_eq!(prepared.flags, PolyFlags::MODULATED);
    assert_eq!(out.vertices[0].color, SceneVertex::WHITE);
    let request = prepared.textures[slot::PRIMARY].as_ref().unwrap();
    assert_eq!(request.variant, CacheVariant::Unmasked);
}
