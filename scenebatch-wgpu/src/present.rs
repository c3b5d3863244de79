//! Present pass
//!
//! Reads the post-process image, applies color grading and gamma, adds an
//! 8x8 ordered dither and writes the output image.

use wgpu::util::DeviceExt;

use scenebatch_core::device::PresentParams;

use crate::targets::{OUTPUT_FORMAT, SceneTargets};

/// 8x8 ordered dither thresholds, row major.
pub const DITHER_MATRIX: [f32; 64] = [
    0.0078125, 0.2578125, 0.1328125, 0.3828125, 0.0234375, 0.2734375, 0.1484375, 0.3984375,
    0.7578125, 0.5078125, 0.8828125, 0.6328125, 0.7734375, 0.5234375, 0.8984375, 0.6484375,
    0.0703125, 0.3203125, 0.1953125, 0.4453125, 0.0859375, 0.3359375, 0.2109375, 0.4609375,
    0.8203125, 0.5703125, 0.9453125, 0.6953125, 0.8359375, 0.5859375, 0.9609375, 0.7109375,
    0.0390625, 0.2890625, 0.1640625, 0.4140625, 0.0546875, 0.3046875, 0.1796875, 0.4296875,
    0.7890625, 0.5390625, 0.9140625, 0.6640625, 0.8046875, 0.5546875, 0.9296875, 0.6796875,
    0.1015625, 0.3515625, 0.2265625, 0.4765625, 0.1171875, 0.3671875, 0.2421875, 0.4921875,
    0.8515625, 0.6015625, 0.9765625, 0.7265625, 0.8671875, 0.6171875, 0.9921875, 0.7421875,
];

/// Uniforms of the present shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PresentUniforms {
    pub inv_gamma: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub gray_formula: u32,
    pub _pad: [u32; 3],
}

impl From<&PresentParams> for PresentUniforms {
    fn from(params: &PresentParams) -> Self {
        Self {
            inv_gamma: params.inv_gamma,
            contrast: params.contrast,
            saturation: params.saturation,
            brightness: params.brightness,
            gray_formula: params.gray_formula,
            _pad: [0; 3],
        }
    }
}

pub struct PresentPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
    #[allow(dead_code)] // Keeps dither_view alive
    dither: wgpu::Texture,
    dither_view: wgpu::TextureView,
    /// Rebuilt whenever the scene targets are recreated
    bind_group: wgpu::BindGroup,
}

impl PresentPass {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, targets: &SceneTargets) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Present Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/present.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Present Bind Group Layout"),
            entries: &[
                // Post-process image
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Dither thresholds
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Present Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Present Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[], // Fullscreen triangle generated in shader
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: OUTPUT_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Present Uniforms"),
            size: std::mem::size_of::<PresentUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let dither = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("Dither Texture"),
                size: wgpu::Extent3d {
                    width: 8,
                    height: 8,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::R32Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(&DITHER_MATRIX),
        );
        let dither_view = dither.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = create_bind_group(device, &layout, targets, &dither_view, &uniforms);

        Self {
            pipeline,
            layout,
            uniforms,
            dither,
            dither_view,
            bind_group,
        }
    }

    /// Point the pass at freshly created targets.
    pub fn rebind(&mut self, device: &wgpu::Device, targets: &SceneTargets) {
        self.bind_group =
            create_bind_group(device, &self.layout, targets, &self.dither_view, &self.uniforms);
    }

    /// Record the present pass into `encoder`, writing `targets.output`.
    pub fn record(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        targets: &SceneTargets,
        params: &PresentParams,
    ) {
        queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&PresentUniforms::from(params)),
        );

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Present Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &targets.output_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    targets: &SceneTargets,
    dither_view: &wgpu::TextureView,
    uniforms: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Present Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&targets.pp_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(dither_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: uniforms.as_entire_binding(),
            },
        ],
    })
}
