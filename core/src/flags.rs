//! Polygon render-state flags supplied by the host engine with every draw.

bitflags::bitflags! {
    /// Per-primitive render state bits.
    ///
    /// Bit values follow the host engine's polygon flag layout so flags can be
    /// passed through unchanged. Bits this crate does not know about are kept
    /// and ignored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PolyFlags: u32 {
        /// Not drawn to color, still depth tested
        const INVISIBLE = 0x0000_0001;
        /// Alpha-tested (palette index 0 is transparent)
        const MASKED = 0x0000_0002;
        /// Additive-style translucency
        const TRANSLUCENT = 0x0000_0004;
        /// Multiplied against the framebuffer
        const MODULATED = 0x0000_0040;
        const TWO_SIDED = 0x0000_0100;
        /// Point sampling
        const NO_SMOOTH = 0x0000_0800;
        /// Premultiplied-alpha blending
        const HIGHLIGHTED = 0x1000_0000;
        /// Volumetric fog is applied to this polygon
        const RENDER_FOG = 0x4000_0000;
        /// Writes depth
        const OCCLUDE = 0x8000_0000;
    }
}

impl PolyFlags {
    /// Build from raw host bits, keeping unknown bits.
    pub fn from_raw(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }

    /// True when neither translucent nor modulated blending is requested.
    pub fn is_opaque_blend(self) -> bool {
        !self.intersects(Self::TRANSLUCENT | Self::MODULATED)
    }
}
