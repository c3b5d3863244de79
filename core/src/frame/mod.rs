//! Frame orchestration
//!
//! [`Renderer`] owns every per-device resource of the batching engine and is
//! the single entry point the host drives: lock a frame, draw primitives,
//! change scene nodes, unlock (and present).
//!
//! Each draw resolves its textures, selects a pipeline, lets the batch state
//! machine decide whether the pending indices must be submitted first, then
//! appends its geometry.

use glam::Vec4;

use crate::batch::{BatchState, FlushRange, FrameEvent, FrameState, SamplerMode};
use crate::config::RendererConfig;
use crate::device::{DeviceError, DrawCall, GpuDevice, PresentParams};
use crate::flags::PolyFlags;
use crate::geometry::{GeometryAllocator, SceneVertex};
use crate::pipeline::{BlendClass, PipelineKey, PipelineTable};
use crate::primitive::{
    BuildContext, Facet, Primitive, PrimitiveGeometry, SurfaceInfo, Tile, TransTexture,
};
use crate::readback::ReadbackImage;
use crate::scene::{SceneNode, SceneProjection};
use crate::stats::FrameStats;
use crate::texture::{CacheVariant, TextureCache, TextureSource};

/// Flash scale meaning "no flash".
pub const NEUTRAL_FLASH_SCALE: Vec4 = Vec4::new(0.5, 0.5, 0.5, 0.0);

/// Field of view used until the host sets a scene node.
const DEFAULT_FOV: f32 = 90.0;

/// Pipeline of the full-screen flash overlay.
const FLASH_PIPELINE: PipelineKey = PipelineKey::new(BlendClass::Highlighted, false, false, false);

/// Screen flash requested when locking a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockParams {
    pub flash_scale: Vec4,
    pub flash_fog: Vec4,
}

impl Default for LockParams {
    fn default() -> Self {
        Self {
            flash_scale: NEUTRAL_FLASH_SCALE,
            flash_fog: Vec4::ZERO,
        }
    }
}

impl LockParams {
    pub fn has_flash(&self) -> bool {
        self.flash_scale != NEUTRAL_FLASH_SCALE || self.flash_fog != Vec4::ZERO
    }
}

/// The frame batching engine bound to one device.
pub struct Renderer<D: GpuDevice> {
    device: D,
    config: RendererConfig,
    pipelines: PipelineTable,
    textures: TextureCache,
    geometry: GeometryAllocator,
    frame: FrameState,
    /// Reused between primitives
    scratch: PrimitiveGeometry,
    scene_node: Option<SceneNode>,
    projection: SceneProjection,
    width: u32,
    height: u32,
    flash: LockParams,
    /// Host gamma brightness (0..1) used by the present pass
    client_brightness: f32,
    precache_pending: bool,
    stats: FrameStats,
}

impl<D: GpuDevice> Renderer<D> {
    /// Build the pipeline table and frame buffers for a `width` x `height`
    /// output.
    pub fn new(
        mut device: D,
        config: RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, DeviceError> {
        let pipelines = PipelineTable::build(&mut device)?;
        let geometry =
            GeometryAllocator::new(config.video.vertex_capacity, config.video.index_capacity);
        let textures = TextureCache::with_max_size(config.video.max_texture_size);
        let projection =
            SceneProjection::from_node(&SceneNode::full(width, height, DEFAULT_FOV), height);

        tracing::info!(
            "Renderer ready: {}x{}, {} vertices / {} indices per frame",
            width,
            height,
            config.video.vertex_capacity,
            config.video.index_capacity
        );

        Ok(Self {
            device,
            config,
            pipelines,
            textures,
            geometry,
            frame: FrameState::Idle,
            scratch: PrimitiveGeometry::default(),
            scene_node: None,
            projection,
            width,
            height,
            flash: LockParams::default(),
            client_brightness: 0.5,
            precache_pending: false,
            stats: FrameStats::default(),
        })
    }

    // ------------------------------------------------------------------
    // Frame lifecycle
    // ------------------------------------------------------------------

    /// Begin a frame: clear the targets, restore the current projection and
    /// map the geometry buffers.
    ///
    /// Resuming a frame left with `unlock(false)` keeps its geometry and
    /// open batch. A failed initial map is fatal.
    pub fn lock(&mut self, params: LockParams) -> Result<(), DeviceError> {
        if self.frame.is_locked() {
            tracing::warn!("lock() called on an already locked frame");
            return Ok(());
        }
        let resuming = matches!(self.frame, FrameState::Suspended(_));

        self.flash = params;
        self.stats = FrameStats::default();
        self.device.begin_frame()?;
        self.device.set_projection(&self.projection);
        if !resuming {
            self.geometry.begin_frame(&mut self.device)?;
        } else if !self.geometry.is_mapped() {
            self.geometry.remap(&mut self.device);
        }

        self.frame = self.frame.apply(FrameEvent::Lock).state;
        Ok(())
    }

    /// End a frame.
    ///
    /// With `present` the remaining batch is drawn, the scene is presented
    /// and the cursors rewind to zero. Without it the frame is only
    /// suspended.
    pub fn unlock(&mut self, present: bool) -> Result<(), DeviceError> {
        let was_locked = self.frame.is_locked();
        self.step(FrameEvent::Unlock {
            present,
            index_cursor: self.geometry.index_cursor(),
        })?;

        if present && was_locked {
            self.geometry.end_frame(&mut self.device);
            let params = self.present_params();
            self.device.present(&params)?;
        }
        Ok(())
    }

    /// Draw everything pending and empty the texture cache.
    ///
    /// With `allow_precache` (and precaching enabled) the host is asked to
    /// precache textures before the next frame, see
    /// [`take_precache_request`](Self::take_precache_request).
    pub fn flush(&mut self, allow_precache: bool) -> Result<(), DeviceError> {
        self.flush_batch()?;
        self.textures.clear(&mut self.device);
        if allow_precache && self.config.video.use_precache {
            self.precache_pending = true;
        }
        Ok(())
    }

    /// Whether a precache pass was requested, clearing the request.
    ///
    /// Hosts poll this before locking a frame and answer it with
    /// [`precache_texture`](Self::precache_texture) calls.
    pub fn take_precache_request(&mut self) -> bool {
        std::mem::take(&mut self.precache_pending)
    }

    pub fn precache_pending(&self) -> bool {
        self.precache_pending
    }

    /// Change output resolution. The texture cache is cleared.
    pub fn set_res(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        self.flush(true)?;
        self.device.resize(width, height)?;
        self.width = width;
        self.height = height;

        let node = self
            .scene_node
            .unwrap_or_else(|| SceneNode::full(width, height, DEFAULT_FOV));
        self.projection = SceneProjection::from_node(&node, height);
        tracing::debug!("Resolution changed to {}x{}", width, height);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scene state
    // ------------------------------------------------------------------

    /// Make `node` the current view. Pending geometry is drawn first.
    pub fn set_scene_node(&mut self, node: &SceneNode) -> Result<(), DeviceError> {
        self.flush_batch()?;
        self.scene_node = Some(*node);
        self.projection = SceneProjection::from_node(node, self.height);
        self.device.set_projection(&self.projection);
        Ok(())
    }

    /// Clear depth after drawing everything pending.
    pub fn clear_z(&mut self) -> Result<(), DeviceError> {
        self.flush_batch()?;
        self.device.clear_depth();
        Ok(())
    }

    /// Overlay the screen flash requested at lock time, if any.
    pub fn end_flash(&mut self) -> Result<(), DeviceError> {
        if !self.flash.has_flash() || !self.frame.is_locked() {
            return Ok(());
        }
        self.flush_batch()?;
        self.device
            .set_projection(&self.projection.with_identity_transform());

        let fog = self.flash.flash_fog;
        let color = [
            fog.x,
            fog.y,
            fog.z,
            1.0 - (self.flash.flash_scale.x * 2.0).min(1.0),
        ];
        let corner = |x: f32, y: f32| SceneVertex {
            pos: [x, y, 0.0],
            color,
            ..Default::default()
        };
        self.scratch.clear();
        self.scratch.push_polygon([
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, 1.0),
        ]);
        self.append(BatchState::new(FLASH_PIPELINE))?;
        self.flush_batch()?;

        self.device.set_projection(&self.projection);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    /// Draw any primitive. Ignored outside a locked frame.
    pub fn draw(&mut self, primitive: Primitive<'_>) -> Result<(), DeviceError> {
        if !self.frame.is_locked() {
            tracing::trace!("Dropping {:?} outside a locked frame", primitive.kind());
            return Ok(());
        }

        let ctx = BuildContext {
            projection: &self.projection,
            pixel_snap: self.config.video.pixel_snap(),
            detail_textures: self.config.video.detail_textures,
            one_x_blending: self.config.video.one_x_blending,
            actor_x_blending: self.config.video.actor_x_blending,
        };
        let prepared = primitive.prepare(&ctx, &mut self.scratch);
        if self.scratch.is_empty() {
            return Ok(());
        }

        let mut textures = [None; 4];
        for (slot, request) in prepared.textures.into_iter().enumerate() {
            if let Some(request) = request {
                textures[slot] =
                    self.textures
                        .resolve(&mut self.device, Some(request.source), request.variant)?;
            }
        }

        let state = BatchState {
            pipeline: PipelineKey::from_flags(prepared.flags),
            textures,
            sampler: SamplerMode::from_flags(prepared.flags, prepared.clamp),
        };
        if self.append(state)? {
            self.stats.count_primitive(prepared.kind);
        }
        Ok(())
    }

    pub fn draw_complex_surface(
        &mut self,
        surface: SurfaceInfo<'_>,
        facet: &Facet,
    ) -> Result<(), DeviceError> {
        self.draw(Primitive::Surface { surface, facet })
    }

    pub fn draw_gouraud_polygon(
        &mut self,
        texture: &mut TextureSource,
        points: &[TransTexture],
        flags: PolyFlags,
    ) -> Result<(), DeviceError> {
        self.draw(Primitive::Gouraud {
            texture,
            points,
            flags,
        })
    }

    pub fn draw_tile(
        &mut self,
        texture: &mut TextureSource,
        tile: &Tile,
        flags: PolyFlags,
    ) -> Result<(), DeviceError> {
        self.draw(Primitive::Tile {
            texture,
            tile,
            flags,
        })
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    /// Upload a texture ahead of its first draw.
    pub fn precache_texture(
        &mut self,
        texture: &mut TextureSource,
        flags: PolyFlags,
    ) -> Result<(), DeviceError> {
        let variant = CacheVariant::from_masked(flags.contains(PolyFlags::MASKED));
        self.textures
            .resolve(&mut self.device, Some(texture), variant)?;
        Ok(())
    }

    /// Re-upload part of an already cached texture.
    pub fn update_texture_rect(
        &mut self,
        texture: &mut TextureSource,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) {
        self.textures
            .update_rect(&mut self.device, texture, x, y, width, height);
    }

    // ------------------------------------------------------------------
    // Readback & queries
    // ------------------------------------------------------------------

    /// The last presented image as bottom-up BGRA8.
    pub fn read_pixels(&mut self) -> Option<ReadbackImage> {
        self.device
            .read_pixels()
            .map(|image| ReadbackImage::from_half(&image))
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            textures_in_cache: self.textures.len(),
            ..self.stats
        }
    }

    pub fn set_client_brightness(&mut self, brightness: f32) {
        self.client_brightness = brightness;
    }

    pub fn present_params(&self) -> PresentParams {
        let present = &self.config.present;
        PresentParams {
            inv_gamma: 1.0 / (1.5 * self.client_brightness.max(0.01) * 2.0),
            contrast: present.clamped_contrast(),
            saturation: present.clamped_saturation(),
            brightness: present.clamped_brightness(),
            gray_formula: present.clamped_gray_formula(),
            vsync: self.config.video.vsync,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn frame_state(&self) -> &FrameState {
        &self.frame
    }

    pub fn geometry(&self) -> &GeometryAllocator {
        &self.geometry
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    pub fn projection(&self) -> &SceneProjection {
        &self.projection
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Release cached textures and hand the device back.
    pub fn into_device(mut self) -> D {
        self.textures.clear(&mut self.device);
        self.device
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Apply a frame event and submit whatever it closes.
    ///
    /// Textures retired by the cache are destroyed once no open batch
    /// references them.
    fn step(&mut self, event: FrameEvent) -> Result<(), DeviceError> {
        let transition = self.frame.apply(event);
        self.frame = transition.state;
        if let Some(range) = transition.flush {
            self.submit(range)?;
        }

        let open = self.frame.open_batch().map(|batch| batch.state.textures);
        self.textures.release_retired(&mut self.device, |texture| {
            open.is_some_and(|slots| slots.contains(&Some(texture)))
        });
        Ok(())
    }

    fn flush_batch(&mut self) -> Result<(), DeviceError> {
        self.step(FrameEvent::Flush {
            index_cursor: self.geometry.index_cursor(),
        })
    }

    /// Open or extend a batch with `state` and append the scratch geometry.
    ///
    /// Returns whether the geometry was written.
    fn append(&mut self, state: BatchState) -> Result<bool, DeviceError> {
        self.step(FrameEvent::Draw {
            state,
            index_cursor: self.geometry.index_cursor(),
        })?;

        let Some(mut writer) = self
            .geometry
            .reserve(self.scratch.vertices.len(), self.scratch.indices.len())
        else {
            return Ok(false);
        };
        writer.write(&self.scratch.vertices, &self.scratch.indices);
        Ok(true)
    }

    /// Unmap, draw, remap.
    fn submit(&mut self, range: FlushRange) -> Result<(), DeviceError> {
        let null = self.textures.null_texture(&mut self.device)?;
        let call = DrawCall {
            pipeline: self.pipelines.get(range.state.pipeline),
            textures: range.state.textures.map(|texture| texture.unwrap_or(null)),
            sampler: range.state.sampler,
            first_index: range.first_index,
            index_count: range.index_count,
        };

        self.geometry.unmap(&mut self.device);
        self.device.draw_indexed(&call);
        self.geometry.remap(&mut self.device);
        self.stats.draw_calls += 1;
        Ok(())
    }
}
