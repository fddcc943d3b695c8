//! Headless wgpu backend.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - emulating the immediate-mode texture API the cache is written against
//! - the color-matrix pipeline used by render-target copies

mod backend;
mod color_matrix;
mod gpu;
mod mapping;
mod mip;

pub use backend::WgpuBackend;
pub use gpu::{Gpu, GpuInit};
