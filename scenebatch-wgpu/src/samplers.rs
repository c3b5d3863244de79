//! Scene samplers, one per [`SamplerMode`].

use scenebatch_core::SamplerMode;

/// Anisotropy used by every smooth sampler.
pub const MAX_ANISOTROPY: u16 = 8;

/// The primary-slot samplers plus the smooth wrapping sampler used by
/// lightmap, macro and detail slots.
pub struct SamplerSet {
    primary: Vec<wgpu::Sampler>,
    secondary: wgpu::Sampler,
}

impl SamplerSet {
    pub fn new(device: &wgpu::Device) -> Self {
        let primary = (0..SamplerMode::COUNT)
            .map(|bits| {
                let mode = SamplerMode::new(
                    bits as u8 & SamplerMode::POINT != 0,
                    bits as u8 & SamplerMode::CLAMP != 0,
                );
                device.create_sampler(&sampler_descriptor(mode))
            })
            .collect();
        let secondary = device.create_sampler(&sampler_descriptor(SamplerMode::default()));

        Self { primary, secondary }
    }

    pub fn primary(&self, mode: SamplerMode) -> &wgpu::Sampler {
        &self.primary[mode.index()]
    }

    pub fn secondary(&self) -> &wgpu::Sampler {
        &self.secondary
    }
}

/// Descriptor for one mode.
///
/// wgpu samplers carry no LOD bias; the scene shader applies it with
/// `textureSampleBias`.
pub fn sampler_descriptor(mode: SamplerMode) -> wgpu::SamplerDescriptor<'static> {
    let address_mode = if mode.is_clamped() {
        wgpu::AddressMode::ClampToEdge
    } else {
        wgpu::AddressMode::Repeat
    };
    let filter = if mode.is_point() {
        wgpu::FilterMode::Nearest
    } else {
        wgpu::FilterMode::Linear
    };
    // Anisotropy requires linear filtering everywhere
    let anisotropy_clamp = if mode.is_point() { 1 } else { MAX_ANISOTROPY };

    wgpu::SamplerDescriptor {
        label: Some(sampler_label(mode)),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Linear,
        anisotropy_clamp,
        ..Default::default()
    }
}

fn sampler_label(mode: SamplerMode) -> &'static str {
    match (mode.is_point(), mode.is_clamped()) {
        (false, false) => "Sampler Linear Wrap",
        (true, false) => "Sampler Nearest Wrap",
        (false, true) => "Sampler Linear Clamp",
        (true, true) => "Sampler Nearest Clamp",
    }
}
