//! Scene render targets
//!
//! The scene is drawn into an HDR color buffer (multisampled when enabled)
//! with its own depth buffer. Before presenting, the color buffer is resolved
//! or copied into the post-process image, which the present pass samples and
//! readback copies from. The present pass writes into `output`.

/// Scene color format.
pub const SCENE_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Scene depth format.
pub const SCENE_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Format of the presented image.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Color, depth, post-process and output textures for one resolution.
///
/// Textures are kept next to their views so the views stay valid.
pub struct SceneTargets {
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    #[allow(dead_code)] // Keeps depth_view alive
    depth: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
    pub pp_image: wgpu::Texture,
    pub pp_view: wgpu::TextureView,
    pub output: wgpu::Texture,
    pub output_view: wgpu::TextureView,
}

impl SceneTargets {
    pub fn new(device: &wgpu::Device, width: u32, height: u32, sample_count: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let sample_count = sample_count.max(1);

        let color = create_target(
            device,
            "Scene Color",
            width,
            height,
            sample_count,
            SCENE_COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let depth = create_target(
            device,
            "Scene Depth",
            width,
            height,
            sample_count,
            SCENE_DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        let pp_image = create_target(
            device,
            "Post-Process Image",
            width,
            height,
            1,
            SCENE_COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        );
        let output = create_target(
            device,
            "Present Output",
            width,
            height,
            1,
            OUTPUT_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );

        tracing::debug!(
            "Created scene targets: {}x{}, {} sample(s)",
            width,
            height,
            sample_count
        );

        Self {
            width,
            height,
            sample_count,
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            depth,
            pp_view: pp_image.create_view(&wgpu::TextureViewDescriptor::default()),
            pp_image,
            output_view: output.create_view(&wgpu::TextureViewDescriptor::default()),
            output,
        }
    }

    pub fn is_multisampled(&self) -> bool {
        self.sample_count > 1
    }

    /// Resolve target for scene passes, only when multisampling.
    pub fn resolve_target(&self) -> Option<&wgpu::TextureView> {
        self.is_multisampled().then_some(&self.pp_view)
    }

    /// Copy the single-sampled scene color into the post-process image.
    ///
    /// Multisampled scenes are resolved by their render passes instead.
    pub fn copy_to_pp_image(&self, encoder: &mut wgpu::CommandEncoder) {
        if self.is_multisampled() {
            return;
        }
        encoder.copy_texture_to_texture(
            self.color.as_image_copy(),
            self.pp_image.as_image_copy(),
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

fn create_target(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    sample_count: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}
