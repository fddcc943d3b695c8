use crate::decode::TexFormat;
use crate::gfx::{TextureHandle, TextureTarget};

/// Guest sampler word (TexMode0) for one texture stage.
///
/// Layout: wrap_s `[1:0]`, wrap_t `[3:2]`, mag_filter `[4]`, min_filter `[7:5]`,
/// diag_lod `[8]`, lod_bias `[16:9]`, max_aniso `[20:19]`, lod_clamp `[21]`.
/// Equality compares the whole word.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct TexMode(pub u32);

impl TexMode {
    /// Builds a mode from its sampler fields; remaining bits are zero.
    pub const fn new(wrap_s: u32, wrap_t: u32, mag_linear: bool, min_filter: u32) -> Self {
        Self((wrap_s & 3) | ((wrap_t & 3) << 2) | ((mag_linear as u32) << 4) | ((min_filter & 7) << 5))
    }

    #[inline]
    pub const fn wrap_s(self) -> u32 {
        self.0 & 3
    }

    #[inline]
    pub const fn wrap_t(self) -> u32 {
        (self.0 >> 2) & 3
    }

    #[inline]
    pub const fn mag_linear(self) -> bool {
        (self.0 >> 4) & 1 != 0
    }

    /// 3-bit code: bit 2 selects linear base filtering, bits 1:0 the mip mode
    /// (0 none, 1 nearest, 2 linear, 3 none).
    #[inline]
    pub const fn min_filter(self) -> u32 {
        (self.0 >> 5) & 7
    }

    /// `true` when the min filter samples between mip levels.
    #[inline]
    pub const fn wants_mipmaps(self) -> bool {
        matches!(self.min_filter() & 3, 1 | 2)
    }
}

/// Everything the cache needs to resolve one texture stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureRequest {
    pub stage: u32,
    pub address: u32,
    pub width: u32,
    pub height: u32,
    pub format: TexFormat,
    pub tlut_address: u32,
    pub tlut_format: u32,
    pub mode: TexMode,
}

/// One cached guest texture.
#[derive(Debug)]
pub struct CacheEntry {
    pub(crate) address: u32,
    pub(crate) texture: Option<TextureHandle>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) format: TexFormat,
    pub(crate) is_non_pow2: bool,
    pub(crate) is_render_target: bool,
    pub(crate) has_mipmaps: bool,
    pub(crate) sentinel_offset: u32,
    pub(crate) sentinel: u32,
    pub(crate) palette_hash: u32,
    pub(crate) original_pixel: u32,
    pub(crate) last_used_frame: u64,
    pub(crate) sampler: Option<TexMode>,
}

impl CacheEntry {
    /// Entry filled by a render-target copy. Sentinel fields stay inert.
    pub(crate) fn render_target(
        address: u32,
        texture: TextureHandle,
        width: u32,
        height: u32,
        format: TexFormat,
        frame: u64,
    ) -> Self {
        Self {
            address,
            texture: Some(texture),
            width,
            height,
            format,
            is_non_pow2: true,
            is_render_target: true,
            has_mipmaps: false,
            sentinel_offset: 0,
            sentinel: 0,
            palette_hash: 0,
            original_pixel: 0,
            last_used_frame: frame,
            sampler: None,
        }
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    /// Always `Some` while the entry is in the cache.
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TexFormat {
        self.format
    }

    pub fn is_non_pow2(&self) -> bool {
        self.is_non_pow2
    }

    pub fn target(&self) -> TextureTarget {
        if self.is_non_pow2 { TextureTarget::Rect } else { TextureTarget::Tex2D }
    }

    pub fn is_render_target(&self) -> bool {
        self.is_render_target
    }

    pub fn has_mipmaps(&self) -> bool {
        self.has_mipmaps
    }

    pub fn sentinel(&self) -> u32 {
        self.sentinel
    }

    pub fn palette_hash(&self) -> u32 {
        self.palette_hash
    }

    pub fn original_pixel(&self) -> u32 {
        self.original_pixel
    }

    pub fn last_used_frame(&self) -> u64 {
        self.last_used_frame
    }

    pub fn sampler(&self) -> Option<TexMode> {
        self.sampler
    }

    /// Guest address of the sentinel word.
    pub fn sentinel_address(&self) -> u32 {
        self.address.wrapping_add(self.sentinel_offset * 4)
    }
}
