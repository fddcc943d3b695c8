//! CPU mip chain generation for `build_mipmaps`.

const BPP: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MipLevel {
    pub width: u32,
    pub height: u32,
    /// Tightly packed 4-byte pixels.
    pub data: Vec<u8>,
}

/// Copies `width x height` pixels out of a buffer with a pitch of
/// `row_length` pixels. Returns `None` if `pixels` is too short.
pub(crate) fn pack_rows(pixels: &[u8], width: u32, height: u32, row_length: u32) -> Option<Vec<u8>> {
    let pitch = row_length as usize * BPP;
    let row = width as usize * BPP;
    let mut out = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        out.extend_from_slice(pixels.get(y * pitch..y * pitch + row)?);
    }
    Some(out)
}

/// Builds the full chain down to 1x1, level 0 first.
pub(crate) fn mip_chain(base: Vec<u8>, width: u32, height: u32) -> Vec<MipLevel> {
    let mut levels = vec![MipLevel { width, height, data: base }];
    loop {
        let Some(prev) = levels.last() else { break };
        if prev.width <= 1 && prev.height <= 1 {
            break;
        }
        let next = downsample(prev);
        levels.push(next);
    }
    levels
}

/// 2x2 box filter. A dimension of 1 is kept; odd edges reuse the last texel.
fn downsample(src: &MipLevel) -> MipLevel {
    let w = (src.width / 2).max(1);
    let h = (src.height / 2).max(1);
    let sw = src.width as usize;
    let texel = |x: usize, y: usize, c: usize| -> u32 {
        let x = x.min(sw - 1);
        let y = y.min(src.height as usize - 1);
        src.data[(y * sw + x) * BPP + c] as u32
    };

    let mut data = Vec::with_capacity(w as usize * h as usize * BPP);
    for y in 0..h as usize {
        for x in 0..w as usize {
            let (x0, y0) = (x * 2, y * 2);
            for c in 0..BPP {
                let sum = texel(x0, y0, c) + texel(x0 + 1, y0, c) + texel(x0, y0 + 1, c) + texel(x0 + 1, y0 + 1, c);
                data.push(((sum + 2) / 4) as u8);
            }
        }
    }
    MipLevel { width: w, height: h, data }
}
