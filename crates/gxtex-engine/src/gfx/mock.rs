//! Recording backend for unit tests.

use std::collections::{BTreeSet, VecDeque};

use super::api::{
    ApiError, FramebufferHandle, GraphicsApi, ImageUpload, MagFilter, MinFilter, ProgramHandle,
    QuadVertex, RenderbufferHandle, TextureHandle, TextureTarget, WrapMode,
};
use super::renderer::{ColorMatrixShader, RenderMode, RendererState};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateTexture(TextureHandle),
    DeleteTexture(TextureHandle),
    BindTexture(TextureTarget, Option<TextureHandle>),
    TexImage { target: TextureTarget, width: u32, height: u32, row_length: u32, has_pixels: bool },
    BuildMipmaps { width: u32, height: u32 },
    MagFilter(TextureTarget, MagFilter),
    MinFilter(TextureTarget, MinFilter),
    Wrap(TextureTarget, WrapMode, WrapMode),
    MaxAnisotropy(TextureTarget, u16),
    ActiveTexture(u32),
    Enable(TextureTarget),
    Disable(TextureTarget),
    CreateFramebuffer(FramebufferHandle),
    DeleteFramebuffer(FramebufferHandle),
    CreateRenderbuffer(RenderbufferHandle, u32, u32),
    DeleteRenderbuffer(RenderbufferHandle),
    Viewport(i32, i32, u32, u32),
    BindProgram(Option<ProgramHandle>),
    DrawQuad([QuadVertex; 4]),
    SetRenderMode(RenderMode),
    ResetState,
    RestoreState,
    SetFramebuffer(Option<FramebufferHandle>),
    SetRenderTarget(Option<TextureHandle>),
    SetDepthTarget(Option<RenderbufferHandle>),
    ViewportChanged,
    DepthBufferRender,
    SetColorMatrix([f32; 16], [f32; 4]),
}

pub(crate) const EFB_COLOR: u32 = 1000;
pub(crate) const EFB_DEPTH: u32 = 1001;
pub(crate) const COLOR_MATRIX_PROGRAM: u32 = 77;

pub(crate) struct MockBackend {
    pub calls: Vec<Call>,
    pub errors: VecDeque<ApiError>,
    /// Error pushed whenever a texture is bound on the rectangle target.
    pub fail_rect_bind: Option<ApiError>,
    pub live_textures: BTreeSet<u32>,
    pub live_framebuffers: BTreeSet<u32>,
    pub live_renderbuffers: BTreeSet<u32>,
    pub target_size: (u32, u32),
    next_name: u32,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            errors: VecDeque::new(),
            fail_rect_bind: None,
            live_textures: BTreeSet::new(),
            live_framebuffers: BTreeSet::new(),
            live_renderbuffers: BTreeSet::new(),
            target_size: (640, 528),
            next_name: 1,
        }
    }

    fn name(&mut self) -> u32 {
        let n = self.next_name;
        self.next_name += 1;
        n
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

fn handle<T>(h: Option<T>) -> T {
    h.expect("mock names are never zero")
}

impl GraphicsApi for MockBackend {
    fn create_texture(&mut self) -> TextureHandle {
        let h = handle(TextureHandle::new(self.name()));
        self.live_textures.insert(h.raw());
        self.calls.push(Call::CreateTexture(h));
        h
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        assert!(self.live_textures.remove(&texture.raw()), "double delete of {texture:?}");
        self.calls.push(Call::DeleteTexture(texture));
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureHandle>) {
        if target == TextureTarget::Rect && texture.is_some() {
            if let Some(err) = self.fail_rect_bind {
                self.errors.push_back(err);
            }
        }
        self.calls.push(Call::BindTexture(target, texture));
    }

    fn tex_image_2d(&mut self, target: TextureTarget, image: &ImageUpload<'_>) {
        self.calls.push(Call::TexImage {
            target,
            width: image.width,
            height: image.height,
            row_length: image.row_length,
            has_pixels: image.pixels.is_some(),
        });
    }

    fn build_mipmaps(&mut self, image: &ImageUpload<'_>) {
        self.calls.push(Call::BuildMipmaps { width: image.width, height: image.height });
    }

    fn set_mag_filter(&mut self, target: TextureTarget, filter: MagFilter) {
        self.calls.push(Call::MagFilter(target, filter));
    }

    fn set_min_filter(&mut self, target: TextureTarget, filter: MinFilter) {
        self.calls.push(Call::MinFilter(target, filter));
    }

    fn set_wrap(&mut self, target: TextureTarget, s: WrapMode, t: WrapMode) {
        self.calls.push(Call::Wrap(target, s, t));
    }

    fn set_max_anisotropy(&mut self, target: TextureTarget, level: u16) {
        self.calls.push(Call::MaxAnisotropy(target, level));
    }

    fn active_texture(&mut self, unit: u32) {
        self.calls.push(Call::ActiveTexture(unit));
    }

    fn enable(&mut self, target: TextureTarget) {
        self.calls.push(Call::Enable(target));
    }

    fn disable(&mut self, target: TextureTarget) {
        self.calls.push(Call::Disable(target));
    }

    fn create_framebuffer(&mut self) -> FramebufferHandle {
        let h = handle(FramebufferHandle::new(self.name()));
        self.live_framebuffers.insert(h.raw());
        self.calls.push(Call::CreateFramebuffer(h));
        h
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        assert!(self.live_framebuffers.remove(&framebuffer.raw()));
        self.calls.push(Call::DeleteFramebuffer(framebuffer));
    }

    fn create_depth_renderbuffer(&mut self, width: u32, height: u32) -> RenderbufferHandle {
        let h = handle(RenderbufferHandle::new(self.name()));
        self.live_renderbuffers.insert(h.raw());
        self.calls.push(Call::CreateRenderbuffer(h, width, height));
        h
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        assert!(self.live_renderbuffers.remove(&renderbuffer.raw()));
        self.calls.push(Call::DeleteRenderbuffer(renderbuffer));
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.calls.push(Call::Viewport(x, y, width, height));
    }

    fn bind_program(&mut self, program: Option<ProgramHandle>) {
        self.calls.push(Call::BindProgram(program));
    }

    fn draw_quad(&mut self, vertices: &[QuadVertex; 4]) {
        self.calls.push(Call::DrawQuad(*vertices));
    }

    fn get_error(&mut self) -> Option<ApiError> {
        self.errors.pop_front()
    }
}

impl RendererState for MockBackend {
    fn set_render_mode(&mut self, mode: RenderMode) {
        self.calls.push(Call::SetRenderMode(mode));
    }

    fn reset_api_state(&mut self) {
        self.calls.push(Call::ResetState);
    }

    fn restore_api_state(&mut self) {
        self.calls.push(Call::RestoreState);
    }

    fn set_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.calls.push(Call::SetFramebuffer(framebuffer));
    }

    fn set_render_target(&mut self, texture: Option<TextureHandle>) {
        self.calls.push(Call::SetRenderTarget(texture));
    }

    fn set_depth_target(&mut self, renderbuffer: Option<RenderbufferHandle>) {
        self.calls.push(Call::SetDepthTarget(renderbuffer));
    }

    fn render_target(&self) -> TextureHandle {
        handle(TextureHandle::new(EFB_COLOR))
    }

    fn depth_buffer_target(&self) -> TextureHandle {
        handle(TextureHandle::new(EFB_DEPTH))
    }

    fn target_width(&self) -> u32 {
        self.target_size.0
    }

    fn target_height(&self) -> u32 {
        self.target_size.1
    }

    fn viewport_changed(&mut self) {
        self.calls.push(Call::ViewportChanged);
    }

    fn set_depth_buffer_render(&mut self) {
        self.calls.push(Call::DepthBufferRender);
    }
}

impl ColorMatrixShader for MockBackend {
    fn color_matrix_program(&self) -> ProgramHandle {
        handle(ProgramHandle::new(COLOR_MATRIX_PROGRAM))
    }

    fn set_color_matrix(&mut self, matrix: &[f32; 16], const_add: &[f32; 4]) {
        self.calls.push(Call::SetColorMatrix(*matrix, *const_add));
    }
}
