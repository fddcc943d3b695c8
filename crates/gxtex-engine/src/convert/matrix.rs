//! Copy-format conversion tables.
//!
//! Every copy format is described as four output rows, each selecting one
//! input channel, the luma weights, or nothing, plus a constant-add vector.
//! Rows index the output channel (R, G, B, A); columns the sampled input.

const R: usize = 0;
const G: usize = 1;
const B: usize = 2;
const A: usize = 3;

/// BT.601 studio-swing luma weights.
const LUMA: [f32; 3] = [0.257, 0.504, 0.098];
const LUMA_BIAS: f32 = 16.0 / 255.0;

/// Row-major 4x4 color transform with a constant-add vector.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ColorMatrix {
    pub matrix: [f32; 16],
    pub const_add: [f32; 4],
}

impl ColorMatrix {
    pub const IDENTITY: ColorMatrix = ColorMatrix {
        matrix: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
        const_add: [0.0; 4],
    };

    /// Applies the transform to one RGBA color.
    pub fn apply(&self, rgba: [f32; 4]) -> [f32; 4] {
        let mut out = self.const_add;
        for (row, o) in out.iter_mut().enumerate() {
            for (col, v) in rgba.iter().enumerate() {
                *o += self.matrix[row * 4 + col] * v;
            }
        }
        out
    }

    pub fn diagonal(&self) -> [f32; 4] {
        [self.matrix[0], self.matrix[5], self.matrix[10], self.matrix[15]]
    }
}

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Row {
    Zero,
    Channel(usize),
    Luma,
}

#[derive(Debug, Copy, Clone)]
struct CopyFormat {
    code: u32,
    name: &'static str,
    rows: [Row; 4],
    const_add: [f32; 4],
}

use Row::{Channel as C, Luma as L, Zero as Z};

const fn fmt(code: u32, name: &'static str, rows: [Row; 4]) -> CopyFormat {
    CopyFormat { code, name, rows, const_add: [0.0; 4] }
}

const fn fmt_add(code: u32, name: &'static str, rows: [Row; 4], const_add: [f32; 4]) -> CopyFormat {
    CopyFormat { code, name, rows, const_add }
}

static DEPTH_FORMATS: [CopyFormat; 8] = [
    fmt(0, "Z4", [C(B), C(B), C(B), C(B)]),
    fmt(1, "Z8", [C(B), C(B), C(B), C(B)]),
    fmt(3, "Z16", [C(G), C(G), C(G), C(B)]),
    fmt(11, "Z16", [C(G), C(G), C(G), C(B)]),
    fmt(6, "Z24X8", [C(R), C(G), C(B), Z]),
    fmt(9, "Z8M", [C(G), C(G), C(G), C(G)]),
    fmt(10, "Z8L", [C(R), C(R), C(R), C(R)]),
    fmt(12, "Z16L", [C(R), C(R), C(R), C(G)]),
];

static INTENSITY_FORMATS: [CopyFormat; 4] = [
    fmt_add(0, "I4", [L, L, L, L], [LUMA_BIAS; 4]),
    fmt_add(1, "I8", [L, L, L, L], [LUMA_BIAS; 4]),
    fmt_add(2, "IA4", [L, L, L, C(A)], [LUMA_BIAS, LUMA_BIAS, LUMA_BIAS, 0.0]),
    fmt_add(3, "IA8", [L, L, L, C(A)], [LUMA_BIAS, LUMA_BIAS, LUMA_BIAS, 0.0]),
];

// 4-bit formats are produced as their 8-bit counterparts.
static COLOR_FORMATS: [CopyFormat; 12] = [
    fmt(0, "R4", [C(R), C(R), C(R), C(R)]),
    fmt(8, "R8", [C(R), C(R), C(R), C(R)]),
    fmt(2, "RA4", [C(R), C(R), C(R), C(A)]),
    fmt(3, "RA8", [C(R), C(R), C(R), C(A)]),
    fmt(7, "A8", [C(A), C(A), C(A), C(A)]),
    fmt(9, "G8", [C(G), C(G), C(G), C(G)]),
    fmt(10, "B8", [C(B), C(B), C(B), C(B)]),
    fmt(11, "RG8", [C(R), C(R), C(R), C(G)]),
    fmt(12, "GB8", [C(G), C(G), C(G), C(B)]),
    // RGB565 has no alpha; force it opaque.
    fmt_add(4, "RGB565", [C(R), C(G), C(B), Z], [0.0, 0.0, 0.0, 1.0]),
    fmt(5, "RGB5A3", [C(R), C(G), C(B), C(A)]),
    fmt(6, "RGBA8", [C(R), C(G), C(B), C(A)]),
];

/// Source of a render-target copy, which selects the format table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CopySource {
    Depth,
    Intensity,
    Color,
}

impl CopySource {
    /// Depth takes precedence over intensity.
    pub fn classify(from_depth: bool, intensity: bool) -> Self {
        if from_depth {
            CopySource::Depth
        } else if intensity {
            CopySource::Intensity
        } else {
            CopySource::Color
        }
    }

    fn table(self) -> &'static [CopyFormat] {
        match self {
            CopySource::Depth => &DEPTH_FORMATS,
            CopySource::Intensity => &INTENSITY_FORMATS,
            CopySource::Color => &COLOR_FORMATS,
        }
    }
}

/// Returns the mnemonic of `copy_format` for `source`, if known.
pub fn copy_format_name(source: CopySource, copy_format: u32) -> Option<&'static str> {
    source.table().iter().find(|f| f.code == copy_format).map(|f| f.name)
}

/// Builds the transform that reinterprets sampled RGBA as `copy_format`.
///
/// Unknown formats log an error and produce the identity transform so the copy
/// still yields something displayable.
pub fn build_color_matrix(from_depth: bool, intensity: bool, copy_format: u32) -> ColorMatrix {
    let source = CopySource::classify(from_depth, intensity);
    let Some(desc) = source.table().iter().find(|f| f.code == copy_format) else {
        log::error!("unknown {source:?} copy format: {copy_format:#x}");
        return ColorMatrix::IDENTITY;
    };

    let mut matrix = [0.0f32; 16];
    for (row, sel) in desc.rows.iter().enumerate() {
        match *sel {
            Row::Zero => {}
            Row::Channel(ch) => matrix[row * 4 + ch] = 1.0,
            Row::Luma => matrix[row * 4..row * 4 + 3].copy_from_slice(&LUMA),
        }
    }

    ColorMatrix { matrix, const_add: desc.const_add }
}
