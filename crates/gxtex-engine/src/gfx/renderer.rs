use super::api::{FramebufferHandle, ProgramHandle, RenderbufferHandle, TextureHandle};

/// Host renderer render mode.
///
/// The depth modes are used while emulating depth-only or depth+alpha passes;
/// a render-target copy always forces `Normal` first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Normal,
    DepthOnly,
    DepthAlpha,
}

/// Host renderer state consumed by the render-target copier.
///
/// `render_target` and `depth_buffer_target` are the textures backing the
/// emulated framebuffer; both have the renderer's target size. The depth
/// buffer target stores depth packed into color channels so it can be sampled
/// like any color texture.
pub trait RendererState {
    fn set_render_mode(&mut self, mode: RenderMode);

    /// Saves the full API state snapshot and resets to neutral defaults.
    fn reset_api_state(&mut self);

    /// Restores the snapshot taken by the last `reset_api_state`.
    fn restore_api_state(&mut self);

    /// Binds `framebuffer`, or the renderer's own framebuffer when `None`.
    fn set_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    /// Attaches `texture` (rectangle target) as color attachment 0 of the bound framebuffer.
    fn set_render_target(&mut self, texture: Option<TextureHandle>);

    /// Attaches `renderbuffer` as the depth attachment of the bound framebuffer.
    fn set_depth_target(&mut self, renderbuffer: Option<RenderbufferHandle>);

    fn render_target(&self) -> TextureHandle;
    fn depth_buffer_target(&self) -> TextureHandle;
    fn target_width(&self) -> u32;
    fn target_height(&self) -> u32;

    /// Viewport-dependent uniforms must be recomputed before the next draw.
    fn viewport_changed(&mut self);

    /// Depth-buffer render mode must be reasserted before the next draw.
    fn set_depth_buffer_render(&mut self);
}

/// Shader subsystem interface for the color-matrix program.
pub trait ColorMatrixShader {
    fn color_matrix_program(&self) -> ProgramHandle;

    /// Uploads the row-major 4x4 matrix and the constant-add vector.
    fn set_color_matrix(&mut self, matrix: &[f32; 16], const_add: &[f32; 4]);
}
