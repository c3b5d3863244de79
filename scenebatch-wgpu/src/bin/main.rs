//! SceneBatch Replay - headless frame renderer
//!
//! Renders a scripted scene through the batching engine on an off-screen
//! wgpu device and writes the result as PNG files.
//!
//! # Usage
//!
//! ```bash
//! scenebatch-replay
//! scenebatch-replay --frames 10 --output frame.png
//! scenebatch-replay --width 1280 --height 720 --multisample 4 --flash
//! scenebatch-replay --frames 60 --flush-every 20 --precache
//! RUST_LOG=debug scenebatch-replay --config renderer.toml
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glam::{Vec3, Vec4};
use smallvec::smallvec;

use scenebatch_core::config::{self, RendererConfig};
use scenebatch_core::primitive::{Facet, MapCoords, SurfaceInfo, Tile, TransTexture};
use scenebatch_core::texture::{MipLevel, PixelFormat, TextureSource};
use scenebatch_core::{LockParams, PolyFlags, Renderer, SceneNode};
use scenebatch_wgpu::{GpuContext, WgpuDevice, save_png, save_rgba_png};

#[derive(Parser)]
#[command(name = "scenebatch-replay")]
#[command(author, version, about = "Render a scripted scene off-screen")]
struct Args {
    /// Output width in pixels
    #[arg(long, default_value = "640")]
    width: u32,

    /// Output height in pixels
    #[arg(long, default_value = "480")]
    height: u32,

    /// Number of frames to render (the last one is saved)
    #[arg(long, short = 'n', default_value = "1")]
    frames: u32,

    /// Presented image (color graded and dithered)
    #[arg(long, short = 'o', default_value = "scenebatch.png")]
    output: PathBuf,

    /// Also save the raw scene image read back before presentation
    #[arg(long, value_name = "FILE")]
    scene_output: Option<PathBuf>,

    /// Renderer config file (default: platform config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured MSAA sample count
    #[arg(long)]
    multisample: Option<u32>,

    /// Overlay a red screen flash
    #[arg(long)]
    flash: bool,

    /// Empty the texture cache after every N frames (0 never)
    #[arg(long, value_name = "N", default_value = "0")]
    flush_every: u32,

    /// Re-upload scene textures after a cache flush
    #[arg(long)]
    precache: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.width == 0 || args.height == 0 {
        anyhow::bail!("Output size must be at least 1x1");
    }

    let mut config: RendererConfig = match &args.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };
    if let Some(samples) = args.multisample {
        config.video.multisample = samples;
    }
    if args.precache {
        config.video.use_precache = true;
    }

    let context = pollster::block_on(GpuContext::headless())?;
    let device = WgpuDevice::new(context, &config.video, args.width, args.height)
        .context("Failed to create render device")?;
    let mut renderer = Renderer::new(device, config, args.width, args.height)
        .context("Failed to create renderer")?;

    let mut scene = DemoScene::new();
    for frame in 0..args.frames.max(1) {
        if renderer.take_precache_request() {
            scene.precache(&mut renderer)?;
            tracing::info!("Precached {} textures", renderer.texture_cache().len());
        }

        scene.render(&mut renderer, frame, args.flash)?;
        tracing::info!("Frame {}: {}", frame, renderer.stats());

        if args.flush_every > 0 && (frame + 1) % args.flush_every == 0 {
            renderer.flush(true)?;
        }
    }

    if let Some(path) = &args.scene_output {
        let image = renderer
            .read_pixels()
            .context("Scene readback failed")?;
        save_png(path, &image)?;
    }

    let (width, height) = renderer.device().size();
    let rgba = renderer
        .device()
        .read_output()
        .context("Output readback failed")?;
    save_rgba_png(&args.output, width, height, rgba)?;

    Ok(())
}

/// Host-side resources of the scripted scene.
struct DemoScene {
    floor: TextureSource,
    floor_lightmap: TextureSource,
    fog_map: TextureSource,
    water: TextureSource,
    hud: TextureSource,
    floor_facet: Facet,
}

impl DemoScene {
    fn new() -> Self {
        let mut floor_lightmap = gradient(2, 8, 8);
        floor_lightmap.scale = glam::Vec2::splat(64.0);
        let mut fog_map = TextureSource::rgba8(3, 4, 4, [40, 40, 60, 96].repeat(16));
        fog_map.scale = glam::Vec2::splat(256.0);

        // Floor below the camera (host camera space is y-down, z-forward)
        let floor_facet = Facet {
            map_coords: MapCoords {
                origin: Vec3::ZERO,
                x_axis: Vec3::X,
                y_axis: Vec3::Z,
            },
            polys: vec![
                smallvec![
                    Vec3::new(-400.0, 60.0, 80.0),
                    Vec3::new(400.0, 60.0, 80.0),
                    Vec3::new(400.0, 60.0, 600.0),
                    Vec3::new(-400.0, 60.0, 600.0),
                ],
                smallvec![
                    Vec3::new(-400.0, 60.0, 600.0),
                    Vec3::new(400.0, 60.0, 600.0),
                    Vec3::new(400.0, 60.0, 1200.0),
                    Vec3::new(-400.0, 60.0, 1200.0),
                ],
            ],
        };

        Self {
            floor: checker(1, 64, [180, 150, 110, 255], [90, 70, 50, 255]),
            floor_lightmap,
            fog_map,
            water: checker(4, 16, [40, 80, 200, 160], [20, 50, 140, 160]),
            hud: hud_texture(5),
            floor_facet,
        }
    }

    /// Upload every scene texture ahead of the next frame.
    fn precache(&mut self, renderer: &mut Renderer<WgpuDevice>) -> Result<()> {
        renderer.precache_texture(&mut self.floor, PolyFlags::empty())?;
        renderer.precache_texture(&mut self.floor_lightmap, PolyFlags::empty())?;
        renderer.precache_texture(&mut self.fog_map, PolyFlags::empty())?;
        renderer.precache_texture(&mut self.water, PolyFlags::TRANSLUCENT)?;
        renderer.precache_texture(&mut self.hud, PolyFlags::MASKED)?;
        Ok(())
    }

    fn render(
        &mut self,
        renderer: &mut Renderer<WgpuDevice>,
        frame: u32,
        flash: bool,
    ) -> Result<()> {
        let (width, height) = renderer.size();
        let params = if flash {
            LockParams {
                flash_scale: Vec4::new(0.25, 0.25, 0.25, 0.0),
                flash_fog: Vec4::new(0.4, 0.0, 0.0, 0.0),
            }
        } else {
            LockParams::default()
        };

        renderer.lock(params)?;
        renderer.set_scene_node(&SceneNode::full(width, height, 90.0))?;

        renderer.draw_complex_surface(
            SurfaceInfo {
                flags: PolyFlags::OCCLUDE,
                texture: Some(&mut self.floor),
                lightmap: Some(&mut self.floor_lightmap),
                fog_map: Some(&mut self.fog_map),
                ..Default::default()
            },
            &self.floor_facet,
        )?;

        // Animated water: rewrite texels every frame
        if frame > 0 {
            shift_texels(&mut self.water);
            self.water.mark_changed();
        }
        let t = frame as f32 * 0.1;
        let water = [
            gouraud_point(-200.0, 20.0, 300.0, 0.0, 0.0, Vec3::new(1.0, 1.0, 1.0)),
            gouraud_point(200.0, 20.0, 300.0, 64.0, 0.0, Vec3::new(0.6 + 0.4 * t.sin(), 0.8, 1.0)),
            gouraud_point(0.0, -120.0, 350.0, 32.0, 64.0, Vec3::new(0.5, 0.5, 1.0)),
        ];
        renderer.draw_gouraud_polygon(
            &mut self.water,
            &water,
            PolyFlags::TRANSLUCENT | PolyFlags::TWO_SIDED,
        )?;

        // Weapon overlay drawn after clearing depth
        renderer.clear_z()?;
        let weapon = [
            gouraud_point(40.0, 40.0, 40.0, 0.0, 0.0, Vec3::splat(0.9)),
            gouraud_point(80.0, 40.0, 40.0, 16.0, 0.0, Vec3::splat(0.7)),
            gouraud_point(80.0, 60.0, 45.0, 16.0, 16.0, Vec3::splat(0.5)),
            gouraud_point(40.0, 60.0, 45.0, 0.0, 16.0, Vec3::splat(0.6)),
        ];
        renderer.draw_gouraud_polygon(&mut self.floor, &weapon, PolyFlags::OCCLUDE)?;

        // HUD
        for i in 0..3 {
            let tile = Tile {
                x: 8.0 + i as f32 * 36.0,
                y: height as f32 - 40.0,
                xl: 32.0,
                yl: 32.0,
                u: 0.0,
                v: 0.0,
                ul: 8.0,
                vl: 8.0,
                z: 1.0,
                color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            };
            renderer.draw_tile(
                &mut self.hud,
                &tile,
                PolyFlags::MASKED | PolyFlags::NO_SMOOTH,
            )?;
        }

        renderer.end_flash()?;
        renderer.unlock(true)?;
        Ok(())
    }
}

fn gouraud_point(x: f32, y: f32, z: f32, u: f32, v: f32, light: Vec3) -> TransTexture {
    TransTexture {
        point: Vec3::new(x, y, z),
        u,
        v,
        light,
        fog: Vec4::ZERO,
    }
}

fn checker(cache_id: u64, size: u32, a: [u8; 4], b: [u8; 4]) -> TextureSource {
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let cell = (x / 8 + y / 8) % 2 == 0;
            data.extend_from_slice(if cell { &a } else { &b });
        }
    }
    TextureSource::rgba8(cache_id, size, size, data)
}

fn gradient(cache_id: u64, width: u32, height: u32) -> TextureSource {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width.max(2).saturating_sub(1).max(1)) as u8;
            let g = (y * 255 / height.max(2).saturating_sub(1).max(1)) as u8;
            data.extend_from_slice(&[r / 2 + 64, g / 2 + 64, 96, 255]);
        }
    }
    TextureSource::rgba8(cache_id, width, height, data)
}

/// 8x8 palettized crosshair; index 0 is the masked background.
fn hud_texture(cache_id: u64) -> TextureSource {
    let mut data = vec![0u8; 64];
    for i in 0..8 {
        data[3 * 8 + i] = 1;
        data[i * 8 + 3] = 1;
    }
    TextureSource::new(
        cache_id,
        PixelFormat::P8,
        vec![MipLevel {
            width: 8,
            height: 8,
            data,
        }],
    )
    .with_palette(vec![[0, 0, 0, 255], [255, 220, 80, 255]])
}

fn shift_texels(texture: &mut TextureSource) {
    if let Some(mip) = texture.mips.first_mut() {
        let row = mip.width as usize * 4;
        if row > 0 && mip.data.len() >= row {
            mip.data.rotate_left(row);
        }
    }
}
