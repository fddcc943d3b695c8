//! Graphics seams.
//!
//! The cache never talks to a concrete GPU library. It issues calls through:
//! - `GraphicsApi`: texture/framebuffer objects, sampler state, draws
//! - `RendererState`: the host renderer's framebuffer and state snapshot
//! - `ColorMatrixShader`: the precompiled color-matrix program
//!
//! `device::WgpuBackend` implements all three on wgpu.

mod api;
mod renderer;

#[cfg(test)]
pub(crate) mod mock;

pub use api::{
    drain_errors, ApiError, FramebufferHandle, GraphicsApi, ImageUpload, MagFilter, MinFilter,
    PixelFormat, ProgramHandle, QuadVertex, RenderbufferHandle, TextureHandle, TextureTarget,
    WrapMode,
};
pub use renderer::{ColorMatrixShader, RenderMode, RendererState};

/// Everything the render-target copier needs from the host.
pub trait GpuBackend: GraphicsApi + RendererState + ColorMatrixShader {}

impl<T: GraphicsApi + RendererState + ColorMatrixShader> GpuBackend for T {}
