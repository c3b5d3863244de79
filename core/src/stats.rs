//! Per-frame counters.

use std::fmt;

use crate::primitive::PrimitiveKind;

/// Work done during the current frame. Reset on every lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub complex_surfaces: u32,
    pub gouraud_polygons: u32,
    pub tiles: u32,
    pub draw_calls: u32,
    /// Textures in the cache at the time of the query
    pub textures_in_cache: usize,
}

impl FrameStats {
    pub fn count_primitive(&mut self, kind: PrimitiveKind) {
        match kind {
            PrimitiveKind::Surface => self.complex_surfaces += 1,
            PrimitiveKind::Gouraud => self.gouraud_polygons += 1,
            PrimitiveKind::Tile => self.tiles += 1,
        }
    }
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Surfaces {}, Gouraud {}, Tiles {}; Draw calls {}; Textures {}",
            self.complex_surfaces,
            self.gouraud_polygons,
            self.tiles,
            self.draw_calls,
            self.textures_in_cache
        )
    }
}
