//! Backend-neutral description of each pipeline permutation.

use super::pipeline_key::{BlendClass, PipelineKey};

/// Blend factor, mirroring what every modern graphics API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    OneMinusSrcColor,
    OneMinusSrcAlpha,
    DstColor,
    DstAlpha,
}

/// Source and destination factors for one channel group (additive operation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendComponent {
    const fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self { src, dst }
    }
}

/// Everything a backend needs to build one scene pipeline.
///
/// Depth testing is always on with a less-or-equal comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineDesc {
    pub key: PipelineKey,
    pub color: BlendComponent,
    pub alpha: BlendComponent,
    /// False for invisible polygons (color write mask is empty)
    pub write_color: bool,
    pub depth_write: bool,
    /// Use the fragment variant that discards low-alpha texels
    pub alpha_test: bool,
}

impl PipelineDesc {
    pub fn for_key(key: PipelineKey) -> Self {
        use BlendFactor::*;

        let (color, alpha) = match key.blend_class() {
            BlendClass::Translucent => (
                BlendComponent::new(One, OneMinusSrcColor),
                BlendComponent::new(One, OneMinusSrcAlpha),
            ),
            BlendClass::Modulated => (
                BlendComponent::new(DstColor, OneMinusSrcColor),
                BlendComponent::new(DstAlpha, OneMinusSrcAlpha),
            ),
            BlendClass::Highlighted => (
                BlendComponent::new(One, OneMinusSrcAlpha),
                BlendComponent::new(One, OneMinusSrcAlpha),
            ),
            BlendClass::Opaque => (
                BlendComponent::new(One, Zero),
                BlendComponent::new(One, Zero),
            ),
        };

        Self {
            key,
            color,
            alpha,
            write_color: !key.is_invisible(),
            depth_write: key.occludes(),
            alpha_test: key.is_masked(),
        }
    }
}
