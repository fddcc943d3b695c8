//! Texture decoder seam.
//!
//! Per-format decoding lives outside this crate. The cache only needs the
//! decoder to expand raw guest bytes into 4-byte pixels and to describe the
//! block width and palette size of each format.

use crate::gfx::PixelFormat;

/// Layout of decoded pixels. Alias of the upload layout.
pub type DecodedFormat = PixelFormat;

/// Guest texture format code (TX_SETIMAGE0 format field).
pub type TexFormat = u32;

pub trait TextureDecoder {
    /// Decodes `expanded_width * height` pixels from `src` into `out`.
    ///
    /// `out` holds at least `expanded_width * height * 4` bytes.
    fn decode(
        &self,
        out: &mut [u8],
        src: &[u8],
        expanded_width: u32,
        height: u32,
        format: TexFormat,
        tlut_address: u32,
        tlut_format: u32,
    ) -> DecodedFormat;

    /// Width in texels of one encoded block. Always a power of two.
    fn block_width(&self, format: TexFormat) -> u32;

    /// Number of palette bytes the format reads, 0 for direct-color formats.
    fn palette_size(&self, format: TexFormat) -> usize;
}

/// Rounds `width` up to the decoder's block width for `format`.
pub fn expanded_width<D: TextureDecoder + ?Sized>(decoder: &D, width: u32, format: TexFormat) -> u32 {
    let bs = decoder.block_width(format).max(1) - 1;
    (width + bs) & !bs
}

/// Decoder for linear, already-RGBA8 texture data.
///
/// Used by the replay tool and tests; real guest formats need a tiled decoder.
/// Bytes missing from the end of `src` decode as zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearRgba8Decoder;

impl LinearRgba8Decoder {
    /// Format code this decoder claims to be paletted (indexes ignored).
    pub const PALETTED_FORMAT: TexFormat = 9;
}

impl TextureDecoder for LinearRgba8Decoder {
    fn decode(
        &self,
        out: &mut [u8],
        src: &[u8],
        expanded_width: u32,
        height: u32,
        _format: TexFormat,
        _tlut_address: u32,
        _tlut_format: u32,
    ) -> DecodedFormat {
        let len = (expanded_width as usize * height as usize * PixelFormat::BYTES_PER_PIXEL).min(out.len());
        let n = len.min(src.len());
        out[..n].copy_from_slice(&src[..n]);
        out[n..len].fill(0);
        PixelFormat::Rgba8
    }

    fn block_width(&self, _format: TexFormat) -> u32 {
        4
    }

    fn palette_size(&self, format: TexFormat) -> usize {
        if format == Self::PALETTED_FORMAT { 32 } else { 0 }
    }
}
