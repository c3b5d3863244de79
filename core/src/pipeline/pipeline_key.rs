//! Flag normalization and the 5-bit pipeline index.

use crate::flags::PolyFlags;

/// Blend mode family, occupying the low two bits of a [`PipelineKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendClass {
    Translucent = 0,
    Modulated = 1,
    Highlighted = 2,
    Opaque = 3,
}

impl BlendClass {
    /// Pick the blend class for already normalized flags.
    ///
    /// Translucent wins over modulated, which wins over highlighted.
    pub fn from_flags(flags: PolyFlags) -> Self {
        if flags.contains(PolyFlags::TRANSLUCENT) {
            Self::Translucent
        } else if flags.contains(PolyFlags::MODULATED) {
            Self::Modulated
        } else if flags.contains(PolyFlags::HIGHLIGHTED) {
            Self::Highlighted
        } else {
            Self::Opaque
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Translucent,
            1 => Self::Modulated,
            2 => Self::Highlighted,
            _ => Self::Opaque,
        }
    }
}

/// Apply the precedence rules that the pipeline table assumes.
///
/// Polygons that are neither translucent nor modulated always write depth.
/// Translucent polygons are never alpha tested.
pub fn normalize(flags: PolyFlags) -> PolyFlags {
    if flags.is_opaque_blend() {
        flags | PolyFlags::OCCLUDE
    } else if flags.contains(PolyFlags::TRANSLUCENT) {
        flags - PolyFlags::MASKED
    } else {
        flags
    }
}

/// Index into the pipeline table.
///
/// Bits 0-1 hold the [`BlendClass`], bit 2 invisible, bit 3 occlude,
/// bit 4 masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineKey(u8);

impl PipelineKey {
    const INVISIBLE: u8 = 1 << 2;
    const OCCLUDE: u8 = 1 << 3;
    const MASKED: u8 = 1 << 4;

    /// Key for an explicit combination, bypassing flag normalization.
    pub const fn new(class: BlendClass, invisible: bool, occlude: bool, masked: bool) -> Self {
        let mut index = class as u8;
        if invisible {
            index |= Self::INVISIBLE;
        }
        if occlude {
            index |= Self::OCCLUDE;
        }
        if masked {
            index |= Self::MASKED;
        }
        Self(index)
    }

    /// Normalize the flags and fold them into a table index.
    pub fn from_flags(flags: PolyFlags) -> Self {
        let flags = normalize(flags);
        Self::new(
            BlendClass::from_flags(flags),
            flags.contains(PolyFlags::INVISIBLE),
            flags.contains(PolyFlags::OCCLUDE),
            flags.contains(PolyFlags::MASKED),
        )
    }

    /// Key for a raw table index. Returns `None` past the end of the table.
    pub fn from_index(index: usize) -> Option<Self> {
        (index < super::PIPELINE_COUNT).then_some(Self(index as u8))
    }

    /// Iterate every key in table order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..super::PIPELINE_COUNT as u8).map(Self)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn blend_class(self) -> BlendClass {
        BlendClass::from_bits(self.0)
    }

    pub fn is_invisible(self) -> bool {
        self.0 & Self::INVISIBLE != 0
    }

    pub fn occludes(self) -> bool {
        self.0 & Self::OCCLUDE != 0
    }

    pub fn is_masked(self) -> bool {
        self.0 & Self::MASKED != 0
    }
}
