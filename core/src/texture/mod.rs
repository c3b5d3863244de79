//! Texture caching
//!
//! Host textures are uploaded on first use and kept until the cache is
//! cleared. Each source may exist twice, once per masked variant.

mod cache;
mod source;

pub use cache::{CacheVariant, TextureCache};
pub use source::{MipLevel, PixelFormat, TextureSource};
