//! Scene pipeline creation
//!
//! Every entry of the pipeline table shares one shader module, one vertex
//! layout and one pipeline layout. Permutations differ only in blend state,
//! color write mask, depth write and the fragment entry point.

use scenebatch_core::SceneVertex;
use scenebatch_core::pipeline::{BlendComponent, BlendFactor, PipelineDesc};

use crate::targets::{SCENE_COLOR_FORMAT, SCENE_DEPTH_FORMAT};

/// Per-projection uniforms (@group(0) @binding(0), dynamic offset).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    pub transform: [[f32; 4]; 4],
    pub lod_bias: f32,
    pub _pad: [f32; 3],
}

/// Stride between uniform slots, the minimum dynamic offset alignment.
pub const UNIFORM_STRIDE: u64 = 256;

/// Layouts shared by all scene pipelines.
pub struct SceneLayouts {
    pub uniforms: wgpu::BindGroupLayout,
    pub textures: wgpu::BindGroupLayout,
    pub pipeline: wgpu::PipelineLayout,
}

impl SceneLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Uniforms Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<SceneUniforms>() as u64
                    ),
                },
                count: None,
            }],
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let textures = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Texture Layout"),
            entries: &[
                // Primary, lightmap, macro, detail or fog map
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                // Primary slot sampler (follows the batch's sampler mode)
                sampler_entry(4),
                // Smooth wrapping sampler for the other slots
                sampler_entry(5),
            ],
        });

        let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&uniforms, &textures],
            push_constant_ranges: &[],
        });

        Self {
            uniforms,
            textures,
            pipeline,
        }
    }
}

pub fn to_wgpu_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
    }
}

fn to_wgpu_component(component: BlendComponent) -> wgpu::BlendComponent {
    wgpu::BlendComponent {
        src_factor: to_wgpu_factor(component.src),
        dst_factor: to_wgpu_factor(component.dst),
        operation: wgpu::BlendOperation::Add,
    }
}

/// Blend, write mask and depth state of one permutation.
pub fn color_target(desc: &PipelineDesc) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format: SCENE_COLOR_FORMAT,
        blend: Some(wgpu::BlendState {
            color: to_wgpu_component(desc.color),
            alpha: to_wgpu_component(desc.alpha),
        }),
        write_mask: if desc.write_color {
            wgpu::ColorWrites::ALL
        } else {
            wgpu::ColorWrites::empty()
        },
    }
}

pub fn depth_state(desc: &PipelineDesc) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: SCENE_DEPTH_FORMAT,
        depth_write_enabled: desc.depth_write,
        depth_compare: wgpu::CompareFunction::LessEqual,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

/// Fragment entry point for a permutation.
pub fn fragment_entry(desc: &PipelineDesc) -> &'static str {
    if desc.alpha_test { "fs_masked" } else { "fs" }
}

const SCENE_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
    0 => Uint32,
    1 => Float32x3,
    2 => Float32x2,
    3 => Float32x2,
    4 => Float32x2,
    5 => Float32x2,
    6 => Float32x4,
];

pub fn scene_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<SceneVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &SCENE_VERTEX_ATTRIBUTES,
    }
}

/// Create the render pipeline for one table entry.
pub fn create_scene_pipeline(
    device: &wgpu::Device,
    layouts: &SceneLayouts,
    shader_module: &wgpu::ShaderModule,
    desc: &PipelineDesc,
    sample_count: u32,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("Scene Pipeline {}", desc.key.index())),
        layout: Some(&layouts.pipeline),
        vertex: wgpu::VertexState {
            module: shader_module,
            entry_point: Some("vs"),
            buffers: &[scene_vertex_layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader_module,
            entry_point: Some(fragment_entry(desc)),
            targets: &[Some(color_target(desc))],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None, // The host culls before submitting
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(depth_state(desc)),
        multisample: wgpu::MultisampleState {
            count: sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenebatch_core::pipeline::{BlendClass, PipelineKey};

    fn desc(class: BlendClass, invisible: bool, occlude: bool, masked: bool) -> PipelineDesc {
        PipelineDesc::for_key(PipelineKey::new(class, invisible, occlude, masked))
    }

    #[test]
    fn test_vertex_layout_covers_vertex() {
        let last = SCENE_VERTEX_ATTRIBUTES[6];
        assert_eq!(last.offset, 48);
        assert_eq!(
            last.offset + last.format.size(),
            std::mem::size_of::<SceneVertex>() as u64
        );
    }

    #[test]
    fn test_translucent_blend() {
        let target = color_target(&desc(BlendClass::Translucent, false, false, false));
        let blend = target.blend.unwrap();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::OneMinusSrc);
        assert_eq!(blend.alpha.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn test_modulated_blend() {
        let target = color_target(&desc(BlendClass::Modulated, false, false, false));
        let blend = target.blend.unwrap();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::Dst);
        assert_eq!(blend.alpha.src_factor, wgpu::BlendFactor::DstAlpha);
    }

    #[test]
    fn test_invisible_masks_color() {
        let target = color_target(&desc(BlendClass::Opaque, true, true, false));
        assert_eq!(target.write_mask, wgpu::ColorWrites::empty());
    }

    #[test]
    fn test_depth_write_follows_occlude() {
        let occluding = depth_state(&desc(BlendClass::Opaque, false, true, false));
        let passing = depth_state(&desc(BlendClass::Opaque, false, false, false));
        assert!(occluding.depth_write_enabled);
        assert!(!passing.depth_write_enabled);
        assert_eq!(occluding.depth_compare, wgpu::CompareFunction::LessEqual);
    }

    #[test]
    fn test_masked_uses_alpha_test_entry() {
        assert_eq!(fragment_entry(&desc(BlendClass::Opaque, false, true, true)), "fs_masked");
        assert_eq!(fragment_entry(&desc(BlendClass::Opaque, false, true, false)), "fs");
    }
}
