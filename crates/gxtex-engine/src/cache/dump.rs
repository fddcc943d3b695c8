use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::decode::TexFormat;
use crate::gfx::PixelFormat;

/// File name of the `index`-th dumped texture.
pub(crate) fn dump_file_name(index: u32, format: TexFormat) -> String {
    format!("txt_{index:04}_{format}.png")
}

/// Writes a decoded texture to `dir` as an RGBA PNG.
///
/// `pixels` has a pitch of `row_length` pixels; only `width` are kept per row.
pub(crate) fn dump_texture(
    dir: &Path,
    index: u32,
    format: TexFormat,
    pixels: &[u8],
    width: u32,
    height: u32,
    row_length: u32,
    layout: PixelFormat,
) -> Result<PathBuf> {
    let bpp = PixelFormat::BYTES_PER_PIXEL;
    let pitch = row_length as usize * bpp;
    let row_bytes = width as usize * bpp;

    let mut rgba = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let row = pixels
            .get(y * pitch..y * pitch + row_bytes)
            .with_context(|| format!("decoded buffer ends before row {y}"))?;
        match layout {
            PixelFormat::Rgba8 => rgba.extend_from_slice(row),
            PixelFormat::Bgra8 => {
                for px in row.chunks_exact(4) {
                    rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                }
            }
        }
    }

    let image = image::RgbaImage::from_raw(width, height, rgba)
        .context("decoded buffer does not match texture size")?;

    let path = dir.join(dump_file_name(index, format));
    image
        .save(&path)
        .with_context(|| format!("failed to write texture dump {}", path.display()))?;
    Ok(path)
}
