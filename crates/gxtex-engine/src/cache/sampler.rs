use crate::config::TextureConfig;
use crate::gfx::{GraphicsApi, MagFilter, MinFilter, TextureTarget, WrapMode};

use super::entry::{CacheEntry, TexMode};

pub(crate) const MAX_ANISOTROPY: u16 = 16;

/// Min filters for mipmapped textures, indexed by the guest's 3-bit code.
const MIN_FILTER_MIPMAPPED: [MinFilter; 8] = [
    MinFilter::Nearest,
    MinFilter::NearestMipmapNearest,
    MinFilter::NearestMipmapLinear,
    MinFilter::Nearest,
    MinFilter::Linear,
    MinFilter::LinearMipmapNearest,
    MinFilter::LinearMipmapLinear,
    MinFilter::Linear,
];

const WRAP_MODES: [WrapMode; 4] = [
    WrapMode::ClampToEdge,
    WrapMode::Repeat,
    WrapMode::MirroredRepeat,
    WrapMode::Repeat,
];

pub(crate) fn min_filter_for(mode: TexMode, has_mipmaps: bool, force_filtering: bool) -> MinFilter {
    let code = mode.min_filter();
    if has_mipmaps {
        let code = if force_filtering && code < 4 { code + 4 } else { code };
        MIN_FILTER_MIPMAPPED[code as usize]
    } else if force_filtering || code >= 4 {
        MinFilter::Linear
    } else {
        MinFilter::Nearest
    }
}

pub(crate) fn mag_filter_for(mode: TexMode, force_filtering: bool) -> MagFilter {
    if mode.mag_linear() || force_filtering { MagFilter::Linear } else { MagFilter::Nearest }
}

pub(crate) fn wrap_mode_for(code: u32) -> WrapMode {
    WRAP_MODES[(code & 3) as usize]
}

/// Applies `mode` to `entry`'s texture, which must be bound on its target.
pub(crate) fn apply_sampler_state<A: GraphicsApi + ?Sized>(
    api: &mut A,
    entry: &mut CacheEntry,
    mode: TexMode,
    config: &TextureConfig,
) {
    entry.sampler = Some(mode);
    let target = entry.target();
    let force = config.force_filtering;

    api.set_mag_filter(target, mag_filter_for(mode, force));

    match target {
        TextureTarget::Rect => {
            api.set_min_filter(target, min_filter_for(mode, false, force));
            if mode.wrap_s() == 2 || mode.wrap_t() == 2 {
                log::debug!(
                    "texture {:#010x}: mirrored wrap unsupported on rectangle target",
                    entry.address
                );
            }
        }
        TextureTarget::Tex2D => {
            api.set_min_filter(target, min_filter_for(mode, entry.has_mipmaps, force));
            api.set_wrap(target, wrap_mode_for(mode.wrap_s()), wrap_mode_for(mode.wrap_t()));
            if config.force_max_anisotropy {
                api.set_max_anisotropy(target, MAX_ANISOTROPY);
            }
        }
    }
}
