//! Renderer configuration (renderer.toml)
//!
//! Handles loading, saving, and providing defaults for renderer settings.
//! Settings are stored in TOML format in the platform-specific config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file name inside [`config_dir`].
pub const CONFIG_FILE: &str = "renderer.toml";

/// Renderer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RendererConfig {
    /// Rendering and batching settings
    #[serde(default)]
    pub video: VideoConfig,
    /// Present pass color grading
    #[serde(default)]
    pub present: PresentConfig,
}

/// Video settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// MSAA sample count, 0 or 1 disables (default: 0)
    #[serde(default)]
    pub multisample: u32,
    /// Wait for vertical blank when presenting (default: true)
    #[serde(default = "default_true")]
    pub vsync: bool,
    /// Re-upload level textures after a cache-clearing flush (default: false)
    #[serde(default)]
    pub use_precache: bool,
    /// Draw surface detail textures (default: true)
    #[serde(default = "default_true")]
    pub detail_textures: bool,
    /// Do not double lightmap intensity (default: false)
    #[serde(default)]
    pub one_x_blending: bool,
    /// Brighter actor lighting (default: false)
    #[serde(default)]
    pub actor_x_blending: bool,
    /// Mip LOD bias for scene samplers (default: -0.5)
    #[serde(default = "default_lod_bias")]
    pub lod_bias: f32,
    /// Largest texture dimension uploaded; bigger textures bind the null
    /// texture (default: 4096)
    #[serde(default = "default_max_texture_size")]
    pub max_texture_size: u32,
    /// Vertex buffer capacity in vertices
    #[serde(default = "default_vertex_capacity")]
    pub vertex_capacity: usize,
    /// Index buffer capacity in indices
    #[serde(default = "default_index_capacity")]
    pub index_capacity: usize,
}

/// Color grading applied while presenting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentConfig {
    /// Additive brightness (default: 0, range: -15..15)
    #[serde(default)]
    pub brightness: f32,
    /// Contrast (default: 1, range: 0.1..3)
    #[serde(default = "default_one")]
    pub contrast: f32,
    /// Saturation (default: 1, clamped to -0.8..0.8 when presenting)
    #[serde(default = "default_one")]
    pub saturation: f32,
    /// Luminance weights used for desaturation (default: 1, range: 0..2)
    #[serde(default = "default_gray_formula")]
    pub gray_formula: u32,
}

fn default_true() -> bool {
    true
}
fn default_one() -> f32 {
    1.0
}
fn default_lod_bias() -> f32 {
    -0.5
}
fn default_max_texture_size() -> u32 {
    4096
}
fn default_vertex_capacity() -> usize {
    256 * 1024
}
fn default_index_capacity() -> usize {
    768 * 1024
}
fn default_gray_formula() -> u32 {
    1
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            multisample: 0,
            vsync: default_true(),
            use_precache: false,
            detail_textures: default_true(),
            one_x_blending: false,
            actor_x_blending: false,
            lod_bias: default_lod_bias(),
            max_texture_size: default_max_texture_size(),
            vertex_capacity: default_vertex_capacity(),
            index_capacity: default_index_capacity(),
        }
    }
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: default_one(),
            saturation: default_one(),
            gray_formula: default_gray_formula(),
        }
    }
}

impl VideoConfig {
    /// Sample count to allocate scene targets with (at least 1).
    pub fn sample_count(&self) -> u32 {
        self.multisample.max(1)
    }

    /// Tile corners are pixel snapped whenever multisampling is configured.
    pub fn pixel_snap(&self) -> bool {
        self.multisample > 0
    }
}

impl PresentConfig {
    pub fn clamped_contrast(&self) -> f32 {
        self.contrast.clamp(0.1, 3.0)
    }

    pub fn clamped_saturation(&self) -> f32 {
        self.saturation.clamp(-0.8, 0.8)
    }

    pub fn clamped_brightness(&self) -> f32 {
        self.brightness.clamp(-15.0, 15.0)
    }

    pub fn clamped_gray_formula(&self) -> u32 {
        self.gray_formula.min(2)
    }
}

/// Errors writing the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the platform-specific configuration directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.scenebatch", "", "SceneBatch")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from the platform config directory.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> RendererConfig {
    config_dir()
        .map(|dir| load_from(&dir.join(CONFIG_FILE)))
        .unwrap_or_default()
}

/// Loads the configuration from an explicit path, falling back to defaults.
pub fn load_from(path: &Path) -> RendererConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
            RendererConfig::default()
        }),
        Err(_) => RendererConfig::default(),
    }
}

/// Saves the configuration to the platform config directory.
///
/// Creates the directory if it doesn't exist.
pub fn save(config: &RendererConfig) -> Result<(), ConfigError> {
    if let Some(dir) = config_dir() {
        save_to(config, &dir.join(CONFIG_FILE))?;
    }
    Ok(())
}

/// Saves the configuration to an explicit path.
pub fn save_to(config: &RendererConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RendererConfig::default();
        assert!(config.video.vsync);
        assert!(!config.video.use_precache);
        assert_eq!(config.video.lod_bias, -0.5);
        assert_eq!(config.video.sample_count(), 1);
        assert!(!config.video.pixel_snap());
        assert_eq!(config.present.contrast, 1.0);
        assert_eq!(config.present.gray_formula, 1);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RendererConfig = toml::from_str(
            r#"
            [video]
            multisample = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.video.multisample, 4);
        assert!(config.video.vsync);
        assert!(config.video.pixel_snap());
        assert_eq!(config.present, PresentConfig::default());
    }

    #[test]
    fn test_present_clamps() {
        let present = PresentConfig {
            brightness: 40.0,
            contrast: 0.0,
            saturation: 1.0,
            gray_formula: 9,
        };
        assert_eq!(present.clamped_brightness(), 15.0);
        assert_eq!(present.clamped_contrast(), 0.1);
        assert_eq!(present.clamped_saturation(), 0.8);
        assert_eq!(present.clamped_gray_formula(), 2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = RendererConfig::default();
        config.video.multisample = 8;
        config.present.brightness = 2.5;
        save_to(&config, &path).unwrap();

        assert_eq!(load_from(&path), config);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "video = 12").unwrap();
        assert_eq!(load_from(&path), RendererConfig::default());
        assert_eq!(
            load_from(&dir.path().join("missing.toml")),
            RendererConfig::default()
        );
    }
}
