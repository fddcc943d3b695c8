//! gxtex engine crate.
//!
//! Texture cache and render-target copy layer for an emulated console GPU,
//! plus a headless wgpu backend to run it on.

pub mod cache;
pub mod config;
pub mod convert;
pub mod decode;
pub mod device;
pub mod gfx;
pub mod logging;
pub mod memory;
pub mod resources;
pub mod stages;

pub use cache::{CacheStats, EfbCopy, SourceRect, TexMode, TextureCache, TextureRequest};
pub use config::TextureConfig;
