//! wgpu implementation of [`GpuDevice`]

use hashbrown::HashMap;

use scenebatch_core::config::VideoConfig;
use scenebatch_core::device::{
    DeviceError, DrawCall, GeometryUpload, GpuDevice, GpuPipelineId, GpuTextureId, HalfImage,
    MapMode, PresentParams, TextureRegion,
};
use scenebatch_core::pipeline::PipelineDesc;
use scenebatch_core::scene::{SceneNode, SceneProjection, Viewport};
use scenebatch_core::{SamplerMode, SceneVertex};

use crate::GpuContext;
use crate::commands::{FrameRecorder, ProjectionSlot, SceneCommand};
use crate::pipelines::{SceneLayouts, SceneUniforms, UNIFORM_STRIDE, create_scene_pipeline};
use crate::present::PresentPass;
use crate::readback::read_texture;
use crate::samplers::SamplerSet;
use crate::targets::SceneTargets;
use crate::textures::TextureStore;

/// Texture bind groups are shared by every draw with the same textures and
/// primary sampler.
type BindGroupKey = ([GpuTextureId; 4], SamplerMode);

/// Projection slots the uniform buffer starts with.
const INITIAL_UNIFORM_SLOTS: usize = 64;

const VERTEX_SIZE: u64 = std::mem::size_of::<SceneVertex>() as u64;
const INDEX_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// Renders scene batches with wgpu into off-screen targets.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    targets: SceneTargets,
    layouts: SceneLayouts,
    shader: wgpu::ShaderModule,
    pipelines: Vec<wgpu::RenderPipeline>,
    textures: TextureStore,
    samplers: SamplerSet,
    lod_bias: f32,

    // Bind group caches
    bind_groups: HashMap<BindGroupKey, wgpu::BindGroup>,
    /// Bind groups referenced by recorded draws, kept until the frame is
    /// submitted even if their textures are removed meanwhile
    frame_bind_groups: Vec<wgpu::BindGroup>,
    frame_bind_group_slots: HashMap<BindGroupKey, usize>,

    // Geometry
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    vertex_capacity: u64,
    index_capacity: u64,
    mapped: Option<MapMode>,

    // Projection uniforms, one slot per projection change
    uniform_buffer: wgpu::Buffer,
    uniform_slots: usize,
    uniform_bind_group: wgpu::BindGroup,

    recorder: FrameRecorder,
    present: PresentPass,
}

impl WgpuDevice {
    pub fn new(
        context: GpuContext,
        video: &VideoConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, DeviceError> {
        let GpuContext { device, queue, .. } = context;

        let targets = SceneTargets::new(&device, width, height, video.sample_count());
        let layouts = SceneLayouts::new(&device);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });
        let samplers = SamplerSet::new(&device);

        let vertex_capacity = video.vertex_capacity as u64;
        let index_capacity = video.index_capacity as u64;
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Vertex Buffer"),
            size: vertex_capacity * VERTEX_SIZE,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Index Buffer"),
            size: index_capacity * INDEX_SIZE,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let (uniform_buffer, uniform_bind_group) =
            create_uniforms(&device, &layouts, INITIAL_UNIFORM_SLOTS);
        let present = PresentPass::new(&device, &queue, &targets);

        tracing::info!(
            "wgpu device ready: {}x{}, {} sample(s), {} vertices / {} indices",
            targets.width,
            targets.height,
            targets.sample_count,
            vertex_capacity,
            index_capacity
        );

        Ok(Self {
            device,
            queue,
            targets,
            layouts,
            shader,
            pipelines: Vec::new(),
            textures: TextureStore::new(),
            samplers,
            lod_bias: video.lod_bias,
            bind_groups: HashMap::new(),
            frame_bind_groups: Vec::new(),
            frame_bind_group_slots: HashMap::new(),
            vertex_buffer,
            index_buffer,
            vertex_capacity,
            index_capacity,
            mapped: None,
            uniform_buffer,
            uniform_slots: INITIAL_UNIFORM_SLOTS,
            uniform_bind_group,
            recorder: FrameRecorder::new(),
            present,
        })
    }

    /// The last presented image as top-down RGBA8.
    pub fn read_output(&self) -> Option<Vec<u8>> {
        read_texture(
            &self.device,
            &self.queue,
            &self.targets.output,
            self.targets.width,
            self.targets.height,
            4,
        )
        .map_err(|e| tracing::warn!("Output readback failed: {}", e))
        .ok()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.targets.width, self.targets.height)
    }

    /// Whether the geometry buffers accept writes.
    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Index of the bind group for `key` in this frame's list.
    fn frame_bind_group(&mut self, key: BindGroupKey) -> Option<usize> {
        if let Some(&index) = self.frame_bind_group_slots.get(&key) {
            return Some(index);
        }

        if !self.bind_groups.contains_key(&key) {
            let bind_group = self.create_texture_bind_group(key)?;
            self.bind_groups.insert(key, bind_group);
        }
        let bind_group = self.bind_groups.get(&key)?.clone();

        let index = self.frame_bind_groups.len();
        self.frame_bind_groups.push(bind_group);
        self.frame_bind_group_slots.insert(key, index);
        Some(index)
    }

    fn create_texture_bind_group(&self, (textures, sampler): BindGroupKey) -> Option<wgpu::BindGroup> {
        let mut views = Vec::with_capacity(textures.len());
        for id in textures {
            match self.textures.view(id) {
                Some(view) => views.push(view),
                None => {
                    tracing::warn!("Draw references missing texture {}", id.0);
                    return None;
                }
            }
        }

        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Texture Bind Group"),
            layout: &self.layouts.textures,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[2]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(views[3]),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(self.samplers.primary(sampler)),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(self.samplers.secondary()),
                },
            ],
        }))
    }

    /// Grow the uniform buffer to hold every slot recorded this frame.
    fn ensure_uniform_capacity(&mut self, slots: usize) {
        if slots <= self.uniform_slots {
            return;
        }
        let mut capacity = self.uniform_slots * 2;
        while capacity < slots {
            capacity *= 2;
        }
        tracing::debug!(
            "Growing projection uniforms: {} -> {} slots",
            self.uniform_slots,
            capacity
        );
        let (buffer, bind_group) = create_uniforms(&self.device, &self.layouts, capacity);
        self.uniform_buffer = buffer;
        self.uniform_bind_group = bind_group;
        self.uniform_slots = capacity;
    }

    fn upload_uniforms(&self) {
        for (i, slot) in self.recorder.slots().iter().enumerate() {
            self.queue.write_buffer(
                &self.uniform_buffer,
                i as u64 * UNIFORM_STRIDE,
                bytemuck::bytes_of(&slot.uniforms),
            );
        }
    }

    /// Replay the recorded frame into scene render passes.
    fn record_scene(&self, encoder: &mut wgpu::CommandEncoder) {
        let commands = self.recorder.commands();
        let slots = self.recorder.slots();

        for plan in self.recorder.plan() {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.color_view,
                    resolve_target: self.targets.resolve_target(),
                    ops: wgpu::Operations {
                        load: if plan.clear_color {
                            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: if plan.clear_depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

            let mut bound_pipeline = None;
            let mut bound_textures = None;
            let mut bound_slot = None;

            for command in &commands[plan.commands] {
                let SceneCommand::Draw {
                    pipeline,
                    bind_group,
                    slot,
                    first_index,
                    index_count,
                } = *command
                else {
                    continue;
                };
                let Some(render_pipeline) = self.pipelines.get(pipeline.0 as usize) else {
                    continue;
                };

                if bound_pipeline != Some(pipeline) {
                    pass.set_pipeline(render_pipeline);
                    bound_pipeline = Some(pipeline);
                }
                if bound_textures != Some(bind_group) {
                    pass.set_bind_group(1, &self.frame_bind_groups[bind_group], &[]);
                    bound_textures = Some(bind_group);
                }
                if bound_slot != Some(slot) {
                    let offset = (slot as u64 * UNIFORM_STRIDE) as u32;
                    pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
                    let (x, y, width, height) = device_viewport(
                        &slots[slot].viewport,
                        self.targets.width,
                        self.targets.height,
                    );
                    pass.set_viewport(x, y, width, height, 0.0, 1.0);
                    bound_slot = Some(slot);
                }

                pass.draw_indexed(first_index..first_index + index_count, 0, 0..1);
            }
        }
    }

    fn end_frame_recording(&mut self) {
        self.recorder.finish();
        self.frame_bind_groups.clear();
        self.frame_bind_group_slots.clear();
    }
}

impl GpuDevice for WgpuDevice {
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        mip_count: u32,
    ) -> Result<GpuTextureId, DeviceError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(DeviceError::TextureCreation {
                width,
                height,
                reason: format!("size must be within 1..={}", max),
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let id = self
            .textures
            .create(&self.device, width, height, mip_count.max(1));
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            self.textures.remove(id);
            return Err(DeviceError::TextureCreation {
                width,
                height,
                reason: error.to_string(),
            });
        }
        Ok(id)
    }

    fn upload_texture(&mut self, texture: GpuTextureId, region: TextureRegion, rgba: &[u8]) {
        self.textures.upload(&self.queue, texture, region, rgba);
    }

    fn destroy_texture(&mut self, texture: GpuTextureId) {
        if self.textures.remove(texture) {
            self.bind_groups
                .retain(|(textures, _), _| !textures.contains(&texture));
        }
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<GpuPipelineId, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = create_scene_pipeline(
            &self.device,
            &self.layouts,
            &self.shader,
            desc,
            self.targets.sample_count,
        );
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(DeviceError::PipelineCreation {
                index: desc.key.index(),
                reason: error.to_string(),
            });
        }

        let id = GpuPipelineId(self.pipelines.len() as u32);
        self.pipelines.push(pipeline);
        Ok(id)
    }

    fn begin_frame(&mut self) -> Result<(), DeviceError> {
        self.end_frame_recording();
        self.recorder.begin();
        Ok(())
    }

    fn map_geometry(&mut self, mode: MapMode) -> Result<(), DeviceError> {
        // Writes go through the queue and never alias submitted ranges, so
        // both modes only track state
        self.mapped = Some(mode);
        Ok(())
    }

    fn unmap_geometry(&mut self, upload: GeometryUpload<'_>) {
        self.mapped = None;
        if upload.is_empty() {
            return;
        }

        let vertex_end = upload.first_vertex as u64 + upload.vertices.len() as u64;
        let index_end = upload.first_index as u64 + upload.indices.len() as u64;
        if vertex_end > self.vertex_capacity || index_end > self.index_capacity {
            tracing::warn!(
                "Geometry upload past buffer end ({} vertices, {} indices), dropped",
                vertex_end,
                index_end
            );
            return;
        }

        if !upload.vertices.is_empty() {
            self.queue.write_buffer(
                &self.vertex_buffer,
                upload.first_vertex as u64 * VERTEX_SIZE,
                bytemuck::cast_slice(upload.vertices),
            );
        }
        if !upload.indices.is_empty() {
            self.queue.write_buffer(
                &self.index_buffer,
                upload.first_index as u64 * INDEX_SIZE,
                bytemuck::cast_slice(upload.indices),
            );
        }
    }

    fn draw_indexed(&mut self, draw: &DrawCall) {
        let Some(bind_group) = self.frame_bind_group((draw.textures, draw.sampler)) else {
            return;
        };
        if !self.recorder.has_projection() {
            let node = SceneNode::full(self.targets.width, self.targets.height, 90.0);
            let projection = SceneProjection::from_node(&node, self.targets.height);
            self.recorder
                .set_projection(ProjectionSlot::new(&projection, self.lod_bias));
        }
        self.recorder
            .push_draw(draw.pipeline, bind_group, draw.first_index, draw.index_count);
    }

    fn clear_depth(&mut self) {
        self.recorder.push_clear_depth();
    }

    fn set_projection(&mut self, projection: &SceneProjection) {
        self.recorder
            .set_projection(ProjectionSlot::new(projection, self.lod_bias));
    }

    fn present(&mut self, params: &PresentParams) -> Result<(), DeviceError> {
        self.ensure_uniform_capacity(self.recorder.slots().len());
        self.upload_uniforms();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        self.record_scene(&mut encoder);
        self.targets.copy_to_pp_image(&mut encoder);
        self.present
            .record(&self.queue, &mut encoder, &self.targets, params);
        self.queue.submit(std::iter::once(encoder.finish()));

        tracing::trace!(
            "Presented {} commands (vsync {})",
            self.recorder.commands().len(),
            params.vsync
        );
        self.end_frame_recording();
        Ok(())
    }

    fn read_pixels(&mut self) -> Option<HalfImage> {
        let bytes = read_texture(
            &self.device,
            &self.queue,
            &self.targets.pp_image,
            self.targets.width,
            self.targets.height,
            8,
        )
        .map_err(|e| tracing::warn!("Scene readback failed: {}", e))
        .ok()?;

        Some(HalfImage {
            width: self.targets.width,
            height: self.targets.height,
            texels: bytemuck::pod_collect_to_vec(&bytes),
        })
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(DeviceError::TargetAllocation(format!(
                "{}x{} exceeds the {} pixel limit",
                width, height, max
            )));
        }

        self.end_frame_recording();
        self.targets = SceneTargets::new(&self.device, width, height, self.targets.sample_count);
        self.present.rebind(&self.device, &self.targets);
        Ok(())
    }
}

fn create_uniforms(
    device: &wgpu::Device,
    layouts: &SceneLayouts,
    slots: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Scene Projection Uniforms"),
        size: slots as u64 * UNIFORM_STRIDE,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Scene Projection Bind Group"),
        layout: &layouts.uniforms,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<SceneUniforms>() as u64),
            }),
        }],
    });
    (buffer, bind_group)
}

/// Convert a bottom-left origin viewport into wgpu's top-left origin,
/// clamped to the target.
pub fn device_viewport(viewport: &Viewport, width: u32, height: u32) -> (f32, f32, f32, f32) {
    let target_w = width as f32;
    let target_h = height as f32;
    let x = viewport.x.clamp(0.0, target_w);
    let y = (target_h - viewport.y - viewport.height).clamp(0.0, target_h);
    let w = viewport.width.clamp(0.0, target_w - x);
    let h = viewport.height.clamp(0.0, target_h - y);
    (x, y, w, h)
}
