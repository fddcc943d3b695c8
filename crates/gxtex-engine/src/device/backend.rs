use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;

use anyhow::Result;

use crate::gfx::{
    ApiError, ColorMatrixShader, FramebufferHandle, GraphicsApi, ImageUpload, MagFilter, MinFilter,
    PixelFormat, ProgramHandle, QuadVertex, RenderMode, RenderbufferHandle, RendererState,
    TextureHandle, TextureTarget, WrapMode,
};
use crate::stages::MAX_STAGES;

use super::color_matrix::{clip_viewport, to_copy_vertices, ColorMatrixPipeline, ColorMatrixUniform, CopyPass};
use super::gpu::Gpu;
use super::mapping::{mip_level_count, texture_format, SamplerState};
use super::mip::{mip_chain, pack_rows};

/// Errors beyond this are dropped, like a driver's bounded error flags.
const MAX_QUEUED_ERRORS: usize = 64;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

// ── objects ───────────────────────────────────────────────────────────────

struct TextureStorage {
    texture: wgpu::Texture,
    /// All levels, for sampling.
    view: wgpu::TextureView,
    /// Level 0 only, for rendering.
    attachment: wgpu::TextureView,
    width: u32,
    height: u32,
    levels: u32,
    format: wgpu::TextureFormat,
}

#[derive(Default)]
struct TextureObject {
    /// Fixed by the first bind.
    target: Option<TextureTarget>,
    storage: Option<TextureStorage>,
    sampler: Option<SamplerState>,
}

#[derive(Debug, Default, Clone, Copy)]
struct FramebufferObject {
    color: Option<TextureHandle>,
    depth: Option<RenderbufferHandle>,
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    width: u32,
    height: u32,
}

#[derive(Debug, Default, Clone, Copy)]
struct TextureUnit {
    tex_2d: Option<TextureHandle>,
    rect: Option<TextureHandle>,
    enabled_2d: bool,
    enabled_rect: bool,
}

impl TextureUnit {
    fn binding(&self, target: TextureTarget) -> Option<TextureHandle> {
        match target {
            TextureTarget::Tex2D => self.tex_2d,
            TextureTarget::Rect => self.rect,
        }
    }

    fn binding_mut(&mut self, target: TextureTarget) -> &mut Option<TextureHandle> {
        match target {
            TextureTarget::Tex2D => &mut self.tex_2d,
            TextureTarget::Rect => &mut self.rect,
        }
    }

    /// Rectangle wins over 2D when both are enabled.
    fn sampled(&self) -> Option<(TextureTarget, TextureHandle)> {
        if self.enabled_rect {
            self.rect.map(|t| (TextureTarget::Rect, t))
        } else if self.enabled_2d {
            self.tex_2d.map(|t| (TextureTarget::Tex2D, t))
        } else {
            None
        }
    }
}

/// State saved by `reset_api_state`. Only the bindings of `units` are restored.
#[derive(Debug, Clone, Copy)]
struct ApiSnapshot {
    active_unit: u32,
    units: [TextureUnit; MAX_STAGES as usize],
    viewport: (i32, i32, u32, u32),
    program: Option<ProgramHandle>,
    framebuffer: Option<FramebufferHandle>,
    render_mode: RenderMode,
}

// ── backend ───────────────────────────────────────────────────────────────

/// wgpu implementation of the graphics seams.
///
/// Emulates an immediate-mode API on top of wgpu: objects are named by
/// integer handles, texture parameters live with the texture, and misuse
/// queues an [`ApiError`] instead of reaching wgpu validation. Every draw is
/// recorded and submitted on its own.
///
/// The emulated framebuffer ("EFB") is a pair of RGBA8 textures of the size
/// given in [`super::GpuInit`]; the depth target stores depth packed into
/// color channels.
pub struct WgpuBackend {
    gpu: Gpu,

    textures: HashMap<TextureHandle, TextureObject>,
    framebuffers: HashMap<FramebufferHandle, FramebufferObject>,
    renderbuffers: HashMap<RenderbufferHandle, DepthBuffer>,
    next_name: NonZeroU32,
    errors: VecDeque<ApiError>,

    active_unit: u32,
    units: [TextureUnit; MAX_STAGES as usize],
    viewport: (i32, i32, u32, u32),
    program: Option<ProgramHandle>,
    framebuffer: Option<FramebufferHandle>,
    render_mode: RenderMode,
    saved: Vec<ApiSnapshot>,

    efb_color: TextureHandle,
    efb_depth: TextureHandle,

    color_matrix_program: ProgramHandle,
    color_matrix: ColorMatrixUniform,
    pipeline: Option<ColorMatrixPipeline>,

    viewport_dirty: bool,
    depth_buffer_render: bool,
    draws: u64,
}

impl WgpuBackend {
    pub fn new(gpu: Gpu) -> Self {
        let (w, h) = gpu.efb_size();
        let mut backend = Self {
            gpu,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            renderbuffers: HashMap::new(),
            next_name: NonZeroU32::MIN,
            errors: VecDeque::new(),
            active_unit: 0,
            units: [TextureUnit::default(); MAX_STAGES as usize],
            viewport: (0, 0, w, h),
            program: None,
            framebuffer: None,
            render_mode: RenderMode::Normal,
            saved: Vec::new(),
            // Replaced below once names can be allocated.
            efb_color: TextureHandle::from_nonzero(NonZeroU32::MIN),
            efb_depth: TextureHandle::from_nonzero(NonZeroU32::MIN),
            color_matrix_program: ProgramHandle::from_nonzero(NonZeroU32::MIN),
            color_matrix: ColorMatrixUniform::default(),
            pipeline: None,
            viewport_dirty: false,
            depth_buffer_render: false,
            draws: 0,
        };

        backend.color_matrix_program = ProgramHandle::from_nonzero(backend.alloc_name());
        backend.efb_color = backend.create_efb_texture("gxtex efb color", w, h);
        backend.efb_depth = backend.create_efb_texture("gxtex efb depth", w, h);

        log::debug!("wgpu backend ready: efb {w}x{h}");
        backend
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    // ── inspection ────────────────────────────────────────────────────────

    /// Size and level count of a texture's storage.
    pub fn texture_info(&self, texture: TextureHandle) -> Option<(u32, u32, u32)> {
        let storage = self.textures.get(&texture)?.storage.as_ref()?;
        Some((storage.width, storage.height, storage.levels))
    }

    /// Textures alive, including the two framebuffer targets.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn renderbuffer_count(&self) -> usize {
        self.renderbuffers.len()
    }

    pub fn bound_texture(&self, unit: u32, target: TextureTarget) -> Option<TextureHandle> {
        self.units.get(unit as usize)?.binding(target)
    }

    pub fn is_enabled(&self, unit: u32, target: TextureTarget) -> bool {
        self.units.get(unit as usize).is_some_and(|u| match target {
            TextureTarget::Tex2D => u.enabled_2d,
            TextureTarget::Rect => u.enabled_rect,
        })
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    /// Quads drawn so far.
    pub fn draw_count(&self) -> u64 {
        self.draws
    }

    /// Returns and clears the viewport-changed notification.
    pub fn take_viewport_changed(&mut self) -> bool {
        std::mem::take(&mut self.viewport_dirty)
    }

    /// Returns and clears the depth-buffer-render notification.
    pub fn take_depth_buffer_render(&mut self) -> bool {
        std::mem::take(&mut self.depth_buffer_render)
    }

    // ── framebuffer contents ──────────────────────────────────────────────

    /// Replaces the framebuffer color target with tightly packed RGBA8 pixels.
    pub fn write_render_target(&mut self, pixels: &[u8]) -> Result<()> {
        self.write_efb(self.efb_color, pixels)
    }

    /// Replaces the framebuffer depth target (depth packed as RGBA8).
    pub fn write_depth_buffer(&mut self, pixels: &[u8]) -> Result<()> {
        self.write_efb(self.efb_depth, pixels)
    }

    fn write_efb(&mut self, texture: TextureHandle, pixels: &[u8]) -> Result<()> {
        let (w, h) = self.gpu.efb_size();
        let expected = w as usize * h as usize * PixelFormat::BYTES_PER_PIXEL;
        anyhow::ensure!(
            pixels.len() == expected,
            "framebuffer upload is {} bytes, expected {expected}",
            pixels.len()
        );
        let storage = self
            .textures
            .get(&texture)
            .and_then(|t| t.storage.as_ref())
            .ok_or_else(|| anyhow::anyhow!("framebuffer target {texture:?} has no storage"))?;
        write_level(&self.gpu, storage, 0, pixels, w, w, h);
        Ok(())
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn alloc_name(&mut self) -> NonZeroU32 {
        let name = self.next_name;
        self.next_name = self.next_name.saturating_add(1);
        name
    }

    fn error(&mut self, err: ApiError) {
        log::trace!("queued {err}");
        if self.errors.len() < MAX_QUEUED_ERRORS {
            self.errors.push_back(err);
        }
    }

    fn create_efb_texture(&mut self, label: &str, width: u32, height: u32) -> TextureHandle {
        let handle = TextureHandle::from_nonzero(self.alloc_name());
        let storage = create_storage(&self.gpu, label, width, height, 1, wgpu::TextureFormat::Rgba8Unorm);
        self.textures.insert(
            handle,
            TextureObject {
                target: Some(TextureTarget::Rect),
                storage: Some(storage),
                sampler: Some(SamplerState::for_target(TextureTarget::Rect)),
            },
        );
        handle
    }

    fn is_efb(&self, texture: TextureHandle) -> bool {
        texture == self.efb_color || texture == self.efb_depth
    }

    /// Texture bound on `target` at the active unit.
    fn bound(&mut self, target: TextureTarget) -> Option<TextureHandle> {
        let bound = self.units[self.active_unit as usize].binding(target);
        if bound.is_none() {
            self.error(ApiError::InvalidOperation);
        }
        bound
    }

    fn with_sampler(&mut self, target: TextureTarget, f: impl FnOnce(&mut SamplerState)) {
        let Some(handle) = self.bound(target) else { return };
        if let Some(obj) = self.textures.get_mut(&handle) {
            f(obj.sampler.get_or_insert_with(|| SamplerState::for_target(target)));
        }
    }

    fn check_upload(&mut self, image: &ImageUpload<'_>) -> bool {
        let max = self.gpu.max_texture_dimension();
        if image.width == 0 || image.height == 0 || image.width > max || image.height > max {
            self.error(ApiError::InvalidValue);
            return false;
        }
        if image.row_length < image.width {
            self.error(ApiError::InvalidValue);
            return false;
        }
        if let Some(pixels) = image.pixels {
            let bpp = PixelFormat::BYTES_PER_PIXEL;
            let needed = (image.row_length as usize * (image.height as usize - 1) + image.width as usize) * bpp;
            if pixels.len() < needed {
                self.error(ApiError::InvalidValue);
                return false;
            }
        }
        true
    }

    /// Resolves the color attachment of the bound framebuffer.
    fn draw_target(&mut self) -> Option<TextureHandle> {
        let Some(fb) = self.framebuffer else {
            return Some(self.efb_color);
        };
        let Some(obj) = self.framebuffers.get(&fb).copied() else {
            self.error(ApiError::InvalidFramebufferOperation);
            return None;
        };
        let color = obj
            .color
            .and_then(|c| self.textures.get(&c).and_then(|t| t.storage.as_ref()).map(|s| (c, s.width, s.height)));
        let Some((color, w, h)) = color else {
            self.error(ApiError::InvalidFramebufferOperation);
            return None;
        };
        if let Some(depth) = obj.depth {
            let fits = self.renderbuffers.get(&depth).is_some_and(|d| d.width >= w && d.height >= h);
            if !fits {
                self.error(ApiError::InvalidFramebufferOperation);
                return None;
            }
        }
        Some(color)
    }
}

fn create_storage(
    gpu: &Gpu,
    label: &str,
    width: u32,
    height: u32,
    levels: u32,
    format: wgpu::TextureFormat,
) -> TextureStorage {
    let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: levels,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let attachment = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("gxtex attachment view"),
        base_mip_level: 0,
        mip_level_count: Some(1),
        ..Default::default()
    });
    TextureStorage { texture, view, attachment, width, height, levels, format }
}

fn write_level(gpu: &Gpu, storage: &TextureStorage, level: u32, pixels: &[u8], row_length: u32, width: u32, height: u32) {
    gpu.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &storage.texture,
            mip_level: level,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(row_length * PixelFormat::BYTES_PER_PIXEL as u32),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
}

// ── GraphicsApi ───────────────────────────────────────────────────────────

impl GraphicsApi for WgpuBackend {
    fn create_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle::from_nonzero(self.alloc_name());
        self.textures.insert(handle, TextureObject::default());
        handle
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if self.is_efb(texture) {
            self.error(ApiError::InvalidOperation);
            return;
        }
        if self.textures.remove(&texture).is_none() {
            self.error(ApiError::InvalidValue);
            return;
        }
        for unit in &mut self.units {
            for slot in [&mut unit.tex_2d, &mut unit.rect] {
                if *slot == Some(texture) {
                    *slot = None;
                }
            }
        }
        for fb in self.framebuffers.values_mut() {
            if fb.color == Some(texture) {
                fb.color = None;
            }
        }
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureHandle>) {
        if let Some(handle) = texture {
            let Some(obj) = self.textures.get_mut(&handle) else {
                self.error(ApiError::InvalidOperation);
                return;
            };
            match obj.target {
                Some(t) if t != target => {
                    self.error(ApiError::InvalidOperation);
                    return;
                }
                Some(_) => {}
                None => {
                    obj.target = Some(target);
                    obj.sampler = Some(SamplerState::for_target(target));
                }
            }
        }
        *self.units[self.active_unit as usize].binding_mut(target) = texture;
    }

    fn tex_image_2d(&mut self, target: TextureTarget, image: &ImageUpload<'_>) {
        let Some(handle) = self.bound(target) else { return };
        if !self.check_upload(image) {
            return;
        }

        let format = texture_format(image.format);
        let storage = create_storage(&self.gpu, "gxtex texture", image.width, image.height, 1, format);
        if let Some(pixels) = image.pixels {
            write_level(&self.gpu, &storage, 0, pixels, image.row_length, image.width, image.height);
        }
        if let Some(obj) = self.textures.get_mut(&handle) {
            obj.storage = Some(storage);
        }
    }

    fn build_mipmaps(&mut self, image: &ImageUpload<'_>) {
        let Some(handle) = self.bound(TextureTarget::Tex2D) else { return };
        if !self.check_upload(image) {
            return;
        }
        let Some(pixels) = image.pixels else {
            self.error(ApiError::InvalidValue);
            return;
        };
        let Some(base) = pack_rows(pixels, image.width, image.height, image.row_length) else {
            self.error(ApiError::InvalidValue);
            return;
        };

        let chain = mip_chain(base, image.width, image.height);
        debug_assert_eq!(chain.len() as u32, mip_level_count(image.width, image.height));

        let format = texture_format(image.format);
        let storage = create_storage(&self.gpu, "gxtex mipmapped texture", image.width, image.height, chain.len() as u32, format);
        for (level, mip) in chain.iter().enumerate() {
            write_level(&self.gpu, &storage, level as u32, &mip.data, mip.width, mip.width, mip.height);
        }
        if let Some(obj) = self.textures.get_mut(&handle) {
            obj.storage = Some(storage);
        }
    }

    fn set_mag_filter(&mut self, target: TextureTarget, filter: MagFilter) {
        self.with_sampler(target, |s| s.mag = filter);
    }

    fn set_min_filter(&mut self, target: TextureTarget, filter: MinFilter) {
        if target == TextureTarget::Rect && filter.uses_mipmaps() {
            self.error(ApiError::InvalidEnum);
            return;
        }
        self.with_sampler(target, |s| s.min = filter);
    }

    fn set_wrap(&mut self, target: TextureTarget, s: WrapMode, t: WrapMode) {
        if target == TextureTarget::Rect && (s == WrapMode::MirroredRepeat || t == WrapMode::MirroredRepeat) {
            self.error(ApiError::InvalidEnum);
            return;
        }
        self.with_sampler(target, |state| {
            state.wrap_s = s;
            state.wrap_t = t;
        });
    }

    fn set_max_anisotropy(&mut self, target: TextureTarget, level: u16) {
        if level == 0 {
            self.error(ApiError::InvalidValue);
            return;
        }
        self.with_sampler(target, |s| s.max_anisotropy = level);
    }

    fn active_texture(&mut self, unit: u32) {
        if unit >= MAX_STAGES {
            self.error(ApiError::InvalidEnum);
            return;
        }
        self.active_unit = unit;
    }

    fn enable(&mut self, target: TextureTarget) {
        let unit = &mut self.units[self.active_unit as usize];
        match target {
            TextureTarget::Tex2D => unit.enabled_2d = true,
            TextureTarget::Rect => unit.enabled_rect = true,
        }
    }

    fn disable(&mut self, target: TextureTarget) {
        let unit = &mut self.units[self.active_unit as usize];
        match target {
            TextureTarget::Tex2D => unit.enabled_2d = false,
            TextureTarget::Rect => unit.enabled_rect = false,
        }
    }

    fn create_framebuffer(&mut self) -> FramebufferHandle {
        let handle = FramebufferHandle::from_nonzero(self.alloc_name());
        self.framebuffers.insert(handle, FramebufferObject::default());
        handle
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.framebuffers.remove(&framebuffer).is_none() {
            self.error(ApiError::InvalidValue);
            return;
        }
        if self.framebuffer == Some(framebuffer) {
            self.framebuffer = None;
        }
    }

    fn create_depth_renderbuffer(&mut self, width: u32, height: u32) -> RenderbufferHandle {
        let handle = RenderbufferHandle::from_nonzero(self.alloc_name());
        let max = self.gpu.max_texture_dimension();
        let (w, h) = (width.clamp(1, max), height.clamp(1, max));
        if (w, h) != (width, height) {
            self.error(ApiError::InvalidValue);
        }
        let texture = self.gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("gxtex depth renderbuffer"),
            size: wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        self.renderbuffers.insert(handle, DepthBuffer { _texture: texture, width: w, height: h });
        handle
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        if self.renderbuffers.remove(&renderbuffer).is_none() {
            self.error(ApiError::InvalidValue);
            return;
        }
        for fb in self.framebuffers.values_mut() {
            if fb.depth == Some(renderbuffer) {
                fb.depth = None;
            }
        }
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = (x, y, width, height);
    }

    fn bind_program(&mut self, program: Option<ProgramHandle>) {
        if program.is_some_and(|p| p != self.color_matrix_program) {
            self.error(ApiError::InvalidValue);
            return;
        }
        self.program = program;
    }

    fn draw_quad(&mut self, vertices: &[QuadVertex; 4]) {
        if self.program != Some(self.color_matrix_program) {
            self.error(ApiError::InvalidOperation);
            return;
        }
        let Some((source_target, source)) = self.units[0].sampled() else {
            self.error(ApiError::InvalidOperation);
            return;
        };
        let Some(target) = self.draw_target() else { return };
        if source == target {
            self.error(ApiError::InvalidOperation);
            return;
        }

        let source_info = self
            .textures
            .get(&source)
            .and_then(|t| t.storage.as_ref().map(|s| ((s.width, s.height), s.levels, t.sampler)));
        let target_info = self.textures.get(&target).and_then(|t| t.storage.as_ref()).map(|s| (s.width, s.height, s.format));
        let (Some((source_size, levels, sampler)), Some((tw, th, format))) = (source_info, target_info) else {
            self.error(ApiError::InvalidOperation);
            return;
        };

        let Some(viewport) = clip_viewport(self.viewport, (tw, th)) else {
            log::trace!("draw skipped: viewport {:?} outside {tw}x{th}", self.viewport);
            return;
        };

        if self.pipeline.as_ref().map(|p| p.format()) != Some(format) {
            self.pipeline = Some(ColorMatrixPipeline::new(self.gpu.device(), format));
        }

        let sampler_state = sampler.unwrap_or_else(|| SamplerState::for_target(source_target));
        let sampler = self.gpu.device().create_sampler(&sampler_state.descriptor(levels));

        let (Some(pipeline), Some(src), Some(dst)) = (
            self.pipeline.as_ref(),
            self.textures.get(&source).and_then(|t| t.storage.as_ref()),
            self.textures.get(&target).and_then(|t| t.storage.as_ref()),
        ) else {
            return;
        };

        pipeline.draw(
            self.gpu.device(),
            self.gpu.queue(),
            &CopyPass {
                source: &src.view,
                sampler: &sampler,
                target: &dst.attachment,
                viewport,
                vertices: to_copy_vertices(vertices, source_target, source_size),
                uniform: self.color_matrix,
            },
        );
        self.draws += 1;
    }

    fn get_error(&mut self) -> Option<ApiError> {
        self.errors.pop_front()
    }
}

// ── RendererState ─────────────────────────────────────────────────────────

impl RendererState for WgpuBackend {
    fn set_render_mode(&mut self, mode: RenderMode) {
        self.render_mode = mode;
    }

    fn reset_api_state(&mut self) {
        self.saved.push(ApiSnapshot {
            active_unit: self.active_unit,
            units: self.units,
            viewport: self.viewport,
            program: self.program,
            framebuffer: self.framebuffer,
            render_mode: self.render_mode,
        });

        // Enable flags are left alone; the stage tracker owns them.
        let (w, h) = self.gpu.efb_size();
        self.active_unit = 0;
        self.viewport = (0, 0, w, h);
        self.program = None;
    }

    fn restore_api_state(&mut self) {
        let Some(saved) = self.saved.pop() else {
            self.error(ApiError::InvalidOperation);
            return;
        };
        self.active_unit = saved.active_unit;
        self.viewport = saved.viewport;
        self.program = saved.program;
        self.render_mode = saved.render_mode;
        // Objects deleted while the snapshot was held must not come back.
        self.framebuffer = saved.framebuffer.filter(|fb| self.framebuffers.contains_key(fb));
        for (unit, prev) in self.units.iter_mut().zip(saved.units) {
            unit.tex_2d = prev.tex_2d.filter(|t| self.textures.contains_key(t));
            unit.rect = prev.rect.filter(|t| self.textures.contains_key(t));
        }
    }

    fn set_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        if framebuffer.is_some_and(|fb| !self.framebuffers.contains_key(&fb)) {
            self.error(ApiError::InvalidOperation);
            return;
        }
        self.framebuffer = framebuffer;
    }

    fn set_render_target(&mut self, texture: Option<TextureHandle>) {
        let Some(fb) = self.framebuffer else {
            self.error(ApiError::InvalidOperation);
            return;
        };
        if texture.is_some_and(|t| !self.textures.contains_key(&t)) {
            self.error(ApiError::InvalidValue);
            return;
        }
        if let Some(obj) = self.framebuffers.get_mut(&fb) {
            obj.color = texture;
        }
    }

    fn set_depth_target(&mut self, renderbuffer: Option<RenderbufferHandle>) {
        let Some(fb) = self.framebuffer else {
            self.error(ApiError::InvalidOperation);
            return;
        };
        if renderbuffer.is_some_and(|r| !self.renderbuffers.contains_key(&r)) {
            self.error(ApiError::InvalidValue);
            return;
        }
        if let Some(obj) = self.framebuffers.get_mut(&fb) {
            obj.depth = renderbuffer;
        }
    }

    fn render_target(&self) -> TextureHandle {
        self.efb_color
    }

    fn depth_buffer_target(&self) -> TextureHandle {
        self.efb_depth
    }

    fn target_width(&self) -> u32 {
        self.gpu.efb_size().0
    }

    fn target_height(&self) -> u32 {
        self.gpu.efb_size().1
    }

    fn viewport_changed(&mut self) {
        self.viewport_dirty = true;
    }

    fn set_depth_buffer_render(&mut self) {
        self.depth_buffer_render = true;
    }
}

// ── ColorMatrixShader ─────────────────────────────────────────────────────

impl ColorMatrixShader for WgpuBackend {
    fn color_matrix_program(&self) -> ProgramHandle {
        self.color_matrix_program
    }

    fn set_color_matrix(&mut self, matrix: &[f32; 16], const_add: &[f32; 4]) {
        self.color_matrix = ColorMatrixUniform::new(matrix, const_add);
    }
}
