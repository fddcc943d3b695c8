//! Fixed-function enums to wgpu descriptors.

use crate::gfx::{MagFilter, MinFilter, PixelFormat, TextureTarget, WrapMode};

pub(crate) fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
    }
}

pub(crate) fn mag_filter_mode(filter: MagFilter) -> wgpu::FilterMode {
    match filter {
        MagFilter::Nearest => wgpu::FilterMode::Nearest,
        MagFilter::Linear => wgpu::FilterMode::Linear,
    }
}

/// Base filter and mip filter for a min filter.
pub(crate) fn min_filter_modes(filter: MinFilter) -> (wgpu::FilterMode, wgpu::MipmapFilterMode) {
    use wgpu::{FilterMode as F, MipmapFilterMode as M};
    match filter {
        MinFilter::Nearest => (F::Nearest, M::Nearest),
        MinFilter::Linear => (F::Linear, M::Nearest),
        MinFilter::NearestMipmapNearest => (F::Nearest, M::Nearest),
        MinFilter::NearestMipmapLinear => (F::Nearest, M::Linear),
        MinFilter::LinearMipmapNearest => (F::Linear, M::Nearest),
        MinFilter::LinearMipmapLinear => (F::Linear, M::Linear),
    }
}

pub(crate) fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

/// Number of levels in a full mip chain for `width x height`.
pub(crate) fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Per-texture sampler parameters, as last set through the API.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SamplerState {
    pub mag: MagFilter,
    pub min: MinFilter,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub max_anisotropy: u16,
}

impl SamplerState {
    /// Initial state of a texture first bound on `target`.
    pub fn for_target(target: TextureTarget) -> Self {
        match target {
            TextureTarget::Tex2D => Self {
                mag: MagFilter::Linear,
                min: MinFilter::NearestMipmapLinear,
                wrap_s: WrapMode::Repeat,
                wrap_t: WrapMode::Repeat,
                max_anisotropy: 1,
            },
            TextureTarget::Rect => Self {
                mag: MagFilter::Linear,
                min: MinFilter::Linear,
                wrap_s: WrapMode::ClampToEdge,
                wrap_t: WrapMode::ClampToEdge,
                max_anisotropy: 1,
            },
        }
    }

    /// Sampler descriptor for a texture with `levels` mip levels.
    ///
    /// Anisotropy only applies when every filter is linear; otherwise it is
    /// dropped.
    pub fn descriptor(&self, levels: u32) -> wgpu::SamplerDescriptor<'static> {
        let mag_filter = mag_filter_mode(self.mag);
        let (min_filter, mipmap_filter) = min_filter_modes(self.min);
        let lod_max_clamp = if self.min.uses_mipmaps() { levels.saturating_sub(1) as f32 } else { 0.0 };

        let all_linear = mag_filter == wgpu::FilterMode::Linear
            && min_filter == wgpu::FilterMode::Linear
            && mipmap_filter == wgpu::MipmapFilterMode::Linear;
        let anisotropy_clamp = if all_linear { self.max_anisotropy.clamp(1, 16) } else { 1 };

        wgpu::SamplerDescriptor {
            label: Some("gxtex texture sampler"),
            address_mode_u: address_mode(self.wrap_s),
            address_mode_v: address_mode(self.wrap_t),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter,
            min_filter,
            mipmap_filter,
            lod_min_clamp: 0.0,
            lod_max_clamp,
            anisotropy_clamp,
            ..Default::default()
        }
    }
}
