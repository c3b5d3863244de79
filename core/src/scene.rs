//! Scene nodes and the projection derived from them.

use glam::{Mat4, Vec4};

/// Near clip distance of the scene frustum.
pub const NEAR_CLIP: f32 = 1.0;
/// Far clip distance of the scene frustum.
pub const FAR_CLIP: f32 = 32768.0;

/// A view into the scene as described by the host.
///
/// `x`/`y` are the viewport origin measured from the top-left of the render
/// target, `width`/`height` its size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneNode {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Horizontal field of view
    pub fov_degrees: f32,
}

impl SceneNode {
    pub fn new(x: u32, y: u32, width: u32, height: u32, fov_degrees: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            fov_degrees,
        }
    }

    /// Full-target node.
    pub fn full(width: u32, height: u32, fov_degrees: f32) -> Self {
        Self::new(0, 0, width, height, fov_degrees)
    }

    pub fn fx(&self) -> f32 {
        self.width as f32
    }

    pub fn fy(&self) -> f32 {
        self.height as f32
    }

    pub fn fx2(&self) -> f32 {
        self.fx() * 0.5
    }

    pub fn fy2(&self) -> f32 {
        self.fy() * 0.5
    }
}

/// Device viewport rectangle. The origin is bottom-left of the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Viewport and transform for one scene node, plus the factors primitives
/// need to unproject screen-space points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneProjection {
    pub viewport: Viewport,
    pub transform: Mat4,
    /// Height over width
    pub aspect: f32,
    /// tan(fov / 2)
    pub rproj_z: f32,
    pub rfx2: f32,
    pub rfy2: f32,
    pub fx2: f32,
    pub fy2: f32,
}

impl SceneProjection {
    /// Projection for `node` on a render target `target_height` pixels tall.
    pub fn from_node(node: &SceneNode, target_height: u32) -> Self {
        let fx = node.fx().max(1.0);
        let fy = node.fy().max(1.0);
        let aspect = fy / fx;
        let rproj_z = (node.fov_degrees.to_radians() * 0.5).tan();

        let viewport = Viewport {
            x: node.x as f32,
            y: target_height as f32 - node.y as f32 - node.height as f32,
            width: node.width as f32,
            height: node.height as f32,
        };

        Self {
            viewport,
            transform: frustum_lh(
                -rproj_z,
                rproj_z,
                -aspect * rproj_z,
                aspect * rproj_z,
                NEAR_CLIP,
                FAR_CLIP,
            ),
            aspect,
            rproj_z,
            rfx2: 2.0 * rproj_z / fx,
            rfy2: 2.0 * rproj_z * aspect / fy,
            fx2: node.fx2(),
            fy2: node.fy2(),
        }
    }

    /// Same viewport, positions passed through untransformed.
    pub fn with_identity_transform(&self) -> Self {
        Self {
            transform: Mat4::IDENTITY,
            ..*self
        }
    }
}

/// Left-handed off-center perspective frustum with a 0..1 depth range.
pub fn frustum_lh(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(2.0 * near / (right - left), 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / (top - bottom), 0.0, 0.0),
        Vec4::new(
            (left + right) / (left - right),
            (top + bottom) / (bottom - top),
            far / (far - near),
            1.0,
        ),
        Vec4::new(0.0, 0.0, -near * far / (far - near), 0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_projection_factors() {
        let node = SceneNode::full(640, 480, 90.0);
        let p = SceneProjection::from_node(&node, 480);
        assert!((p.rproj_z - 1.0).abs() < 1e-5);
        assert!((p.aspect - 0.75).abs() < 1e-6);
        assert!((p.rfx2 - 2.0 / 640.0).abs() < 1e-7);
        assert!((p.rfy2 - 2.0 * 0.75 / 480.0).abs() < 1e-7);
        assert_eq!(p.fx2, 320.0);
        assert_eq!(p.fy2, 240.0);
    }

    #[test]
    fn test_viewport_flips_origin() {
        let node = SceneNode::new(10, 20, 100, 50, 90.0);
        let p = SceneProjection::from_node(&node, 480);
        assert_eq!(
            p.viewport,
            Viewport {
                x: 10.0,
                y: 410.0,
                width: 100.0,
                height: 50.0,
            }
        );
    }

    #[test]
    fn test_frustum_depth_range() {
        let node = SceneNode::full(640, 480, 90.0);
        let m = SceneProjection::from_node(&node, 480).transform;

        let near = m.project_point3(Vec3::new(0.0, 0.0, NEAR_CLIP));
        let far = m.project_point3(Vec3::new(0.0, 0.0, FAR_CLIP));
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);

        // The frustum edge at the near plane lands on the clip boundary
        let edge = m.project_point3(Vec3::new(1.0, 0.75, NEAR_CLIP));
        assert!((edge.x - 1.0).abs() < 1e-5);
        assert!((edge.y - 1.0).abs() < 1e-5);
    }
}
