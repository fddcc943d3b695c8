//! Pixel-format conversion for render-target copies.

mod matrix;

pub use matrix::{build_color_matrix, copy_format_name, ColorMatrix, CopySource};
