use crate::convert::build_color_matrix;
use crate::decode::{TexFormat, TextureDecoder};
use crate::gfx::{
    drain_errors, GpuBackend, GraphicsApi, ImageUpload, MagFilter, MinFilter, PixelFormat,
    QuadVertex, RenderMode, TextureHandle, TextureTarget, WrapMode,
};
use crate::memory::GuestMemory;
use crate::resources;

use super::entry::CacheEntry;
use super::{release_entry, TextureCache};

/// Source rectangle in render-target pixels (top-left origin).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SourceRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl SourceRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.right.wrapping_sub(self.left).unsigned_abs()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.bottom.wrapping_sub(self.top).unsigned_abs()
    }
}

/// A guest request to copy the render target (or depth buffer) into texture memory.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EfbCopy {
    /// Guest address the copy lands at; also the cache key.
    pub address: u32,
    pub from_depth: bool,
    pub intensity: bool,
    pub copy_format: TexFormat,
    pub scale_by_half: bool,
    pub source: SourceRect,
}

/// Destination size of a copy: source size, optionally halved, rounded up to 8.
pub fn copy_dimensions(source: &SourceRect, scale_by_half: bool) -> (u32, u32) {
    let m = if scale_by_half { 2 } else { 1 };
    let round = |v: u32| (v / m + 7) & !7;
    (round(source.width()), round(source.height()))
}

/// Full-screen quad sampling `source`. Texture coordinates are flipped into
/// the render target's bottom-left origin using `target_height`.
pub fn copy_quad(source: &SourceRect, target_height: u32) -> [QuadVertex; 4] {
    let h = target_height as f32;
    let left = source.left as f32;
    let right = source.right as f32;
    let top = h - source.top as f32;
    let bottom = h - source.bottom as f32;
    [
        QuadVertex { pos: [-1.0, 1.0], tex: [left, bottom] },
        QuadVertex { pos: [-1.0, -1.0], tex: [left, top] },
        QuadVertex { pos: [1.0, -1.0], tex: [right, top] },
        QuadVertex { pos: [1.0, 1.0], tex: [right, bottom] },
    ]
}

impl<M: GuestMemory, D: TextureDecoder> TextureCache<M, D> {
    /// Copies the current render target (or depth buffer) into the entry at
    /// `copy.address`, converting through the color matrix for `copy_format`.
    ///
    /// Renderer state is restored before returning.
    pub fn copy_render_target_to_texture<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        copy: &EfbCopy,
    ) {
        let (w, h) = copy_dimensions(&copy.source, copy.scale_by_half);
        if w == 0 || h == 0 {
            log::warn!("skipping empty render-target copy to {:#010x}: {:?}", copy.address, copy.source);
            return;
        }

        let texture = self.prepare_copy_target(backend, copy.address, w, h);
        if let Some(entry) = self.entries.get_mut(&copy.address) {
            entry.format = copy.copy_format;
            entry.last_used_frame = self.frame;
            entry.is_render_target = true;
        }
        self.stats.render_target_copies += 1;

        let matrix = build_color_matrix(copy.from_depth, copy.intensity, copy.copy_format);

        backend.set_render_mode(RenderMode::Normal);
        backend.reset_api_state();

        let framebuffer = resources::ensure_framebuffer(backend, &mut self.scratch_framebuffer);
        backend.set_framebuffer(Some(framebuffer));
        backend.set_render_target(Some(texture));
        let depth = self.depth_targets.acquire(backend, w, h, self.frame);
        backend.set_depth_target(Some(depth));

        backend.active_texture(0);
        let source = if copy.from_depth {
            backend.depth_buffer_target()
        } else {
            backend.render_target()
        };
        backend.bind_texture(TextureTarget::Rect, Some(source));
        self.stages.enable_tex_rect(backend, 0);

        backend.viewport(0, 0, w, h);

        let program = backend.color_matrix_program();
        backend.bind_program(Some(program));
        backend.set_color_matrix(&matrix.matrix, &matrix.const_add);

        let quad = copy_quad(&copy.source, backend.target_height());
        backend.draw_quad(&quad);

        // Leave the scratch framebuffer detached for the next copy.
        backend.set_render_target(None);
        backend.set_depth_target(None);
        backend.set_framebuffer(None);

        backend.restore_api_state();
        backend.viewport_changed();

        self.stages.disable_stage(backend, 0);

        if copy.from_depth {
            backend.set_depth_buffer_render();
        }

        log::debug!(
            "render-target copy -> {:#010x} {w}x{h} fmt {} (depth {}, intensity {})",
            copy.address,
            copy.copy_format,
            copy.from_depth,
            copy.intensity
        );
    }

    /// Returns the rectangle texture to render into, reusing the entry's
    /// texture when it is a same-sized render target that still binds cleanly.
    fn prepare_copy_target<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        address: u32,
        width: u32,
        height: u32,
    ) -> TextureHandle {
        let reusable = self
            .entries
            .get(&address)
            .filter(|e| e.is_render_target && e.width == width && e.height == height)
            .and_then(|e| e.texture);

        if let Some(texture) = reusable {
            drain_errors(api, "render-target copy");
            api.bind_texture(TextureTarget::Rect, Some(texture));
            match api.get_error() {
                None => return texture,
                Some(err) => {
                    log::debug!("render target {address:#010x} failed to rebind ({err}); recreating");
                    drain_errors(api, "render-target copy");
                }
            }
        }

        if let Some(mut old) = self.entries.remove(&address) {
            release_entry(api, &mut self.memory, &mut old);
        }

        let texture = resources::allocate_texture(api);
        api.bind_texture(TextureTarget::Rect, Some(texture));
        api.tex_image_2d(TextureTarget::Rect, &ImageUpload::empty(width, height, PixelFormat::Rgba8));
        api.set_mag_filter(TextureTarget::Rect, MagFilter::Linear);
        api.set_min_filter(TextureTarget::Rect, MinFilter::Linear);
        api.set_wrap(TextureTarget::Rect, WrapMode::ClampToEdge, WrapMode::ClampToEdge);

        self.entries.insert(
            address,
            CacheEntry::render_target(address, texture, width, height, 0, self.frame),
        );
        texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::{new_cache, ram_with_texture, TestCache};
    use crate::cache::{TexMode, TextureRequest};
    use crate::gfx::mock::{Call, MockBackend, COLOR_MATRIX_PROGRAM, EFB_COLOR, EFB_DEPTH};
    use crate::gfx::{ApiError, ProgramHandle};

    fn copy(address: u32, w: i32, h: i32) -> EfbCopy {
        EfbCopy {
            address,
            from_depth: false,
            intensity: false,
            copy_format: 6,
            scale_by_half: false,
            source: SourceRect::new(0, 0, w, h),
        }
    }

    fn handle_at(cache: &TestCache, addr: u32) -> TextureHandle {
        cache.entry(addr).unwrap().texture().unwrap()
    }

    // ── geometry ──────────────────────────────────────────────────────────

    #[test]
    fn halved_copy_rounds_up_to_eight() {
        assert_eq!(copy_dimensions(&SourceRect::new(0, 0, 100, 60), true), (56, 32));
        assert_eq!(copy_dimensions(&SourceRect::new(0, 0, 100, 60), false), (104, 64));
        assert_eq!(copy_dimensions(&SourceRect::new(0, 0, 64, 64), false), (64, 64));
    }

    #[test]
    fn reversed_rect_uses_absolute_size() {
        assert_eq!(copy_dimensions(&SourceRect::new(100, 60, 0, 0), false), (104, 64));
    }

    #[test]
    fn quad_flips_vertically() {
        let q = copy_quad(&SourceRect::new(10, 20, 110, 80), 528);
        assert_eq!(q[0], QuadVertex { pos: [-1.0, 1.0], tex: [10.0, 448.0] });
        assert_eq!(q[1], QuadVertex { pos: [-1.0, -1.0], tex: [10.0, 508.0] });
        assert_eq!(q[2], QuadVertex { pos: [1.0, -1.0], tex: [110.0, 508.0] });
        assert_eq!(q[3], QuadVertex { pos: [1.0, 1.0], tex: [110.0, 448.0] });
    }

    // ── pass ──────────────────────────────────────────────────────────────

    #[test]
    fn pass_runs_in_order() {
        let mut cache = new_cache(ram_with_texture(0x1000, 64));
        let mut gpu = MockBackend::new();
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 64, 32));

        let tex = handle_at(&cache, 0x8000);
        let efb = TextureHandle::new(EFB_COLOR);
        let program = ProgramHandle::new(COLOR_MATRIX_PROGRAM);
        let expected = [
            Call::SetRenderMode(RenderMode::Normal),
            Call::ResetState,
            Call::SetRenderTarget(Some(tex)),
            Call::BindTexture(TextureTarget::Rect, efb),
            Call::Enable(TextureTarget::Rect),
            Call::Viewport(0, 0, 64, 32),
            Call::BindProgram(program),
            Call::SetRenderTarget(None),
            Call::SetDepthTarget(None),
            Call::SetFramebuffer(None),
            Call::RestoreState,
            Call::ViewportChanged,
            Call::Disable(TextureTarget::Rect),
        ];
        let positions: Vec<usize> = expected
            .iter()
            .map(|c| gpu.position(c).unwrap_or_else(|| panic!("missing {c:?}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");

        let draw = gpu.calls.iter().position(|c| matches!(c, Call::DrawQuad(_))).unwrap();
        assert!(draw > positions[6] && draw < positions[7]);
        assert_eq!(gpu.count(|c| matches!(c, Call::DepthBufferRender)), 0);
        assert_eq!(cache.stages().masks(), (0, 0));
    }

    #[test]
    fn rgba8_copy_uploads_identity() {
        let mut cache = new_cache(ram_with_texture(0x1000, 64));
        let mut gpu = MockBackend::new();
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 16, 16));

        let identity = crate::convert::ColorMatrix::IDENTITY;
        assert!(gpu.position(&Call::SetColorMatrix(identity.matrix, [0.0; 4])).is_some());
    }

    #[test]
    fn entry_is_render_target() {
        let mut cache = new_cache(ram_with_texture(0x1000, 64));
        let mut gpu = MockBackend::new();
        cache.set_frame(9);
        let mut c = copy(0x8000, 100, 60);
        c.scale_by_half = true;
        c.copy_format = 4;
        cache.copy_render_target_to_texture(&mut gpu, &c);

        let e = cache.entry(0x8000).unwrap();
        assert!(e.is_render_target());
        assert_eq!(e.target(), TextureTarget::Rect);
        assert!(!e.has_mipmaps());
        assert_eq!((e.width(), e.height()), (56, 32));
        assert_eq!(e.format(), 4);
        assert_eq!(e.last_used_frame(), 9);
        assert_eq!(e.sentinel(), 0);
        assert_eq!(e.sampler(), None);
        assert_eq!(cache.stats().render_target_copies, 1);
    }

    #[test]
    fn empty_copy_is_skipped() {
        let mut cache = new_cache(ram_with_texture(0x1000, 64));
        let mut gpu = MockBackend::new();
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 0, 16));
        assert!(gpu.calls.is_empty());
        assert!(cache.entry(0x8000).is_none());
    }

    // ── texture reuse ─────────────────────────────────────────────────────

    #[test]
    fn same_size_reuses_texture() {
        let mut cache = new_cache(ram_with_texture(0x1000, 64));
        let mut gpu = MockBackend::new();
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 64, 32));
        let first = handle_at(&cache, 0x8000);

        gpu.clear_calls();
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 64, 32));
        assert_eq!(handle_at(&cache, 0x8000), first);
        assert_eq!(gpu.count(|c| matches!(c, Call::CreateTexture(_))), 0);
        assert_eq!(gpu.count(|c| matches!(c, Call::TexImage { .. })), 0);
    }

    #[test]
    fn size_change_recreates_texture() {
        let mut cache = new_cache(ram_with_texture(0x1000, 64));
        let mut gpu = MockBackend::new();
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 64, 32));
        let first = handle_at(&cache, 0x8000);

        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 32, 32));
        let second = handle_at(&cache, 0x8000);
        assert_ne!(first, second);
        assert!(gpu.position(&Call::DeleteTexture(first)).is_some());
        assert!(gpu.position(&Call::TexImage {
            target: TextureTarget::Rect,
            width: 32,
            height: 32,
            row_length: 32,
            has_pixels: false,
        })
        .is_some());
        assert!(gpu.position(&Call::Wrap(TextureTarget::Rect, WrapMode::ClampToEdge, WrapMode::ClampToEdge)).is_some());
        assert_eq!(gpu.live_textures.len(), 1);
    }

    #[test]
    fn rebind_error_recreates_texture() {
        let mut cache = new_cache(ram_with_texture(0x1000, 64));
        let mut gpu = MockBackend::new();
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 64, 32));
        let first = handle_at(&cache, 0x8000);

        gpu.fail_rect_bind = Some(ApiError::InvalidOperation);
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 64, 32));
        assert_ne!(handle_at(&cache, 0x8000), first);
        assert!(!gpu.live_textures.contains(&first.raw()));
    }

    #[test]
    fn pending_errors_do_not_force_recreation() {
        let mut cache = new_cache(ram_with_texture(0x1000, 64));
        let mut gpu = MockBackend::new();
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 64, 32));
        let first = handle_at(&cache, 0x8000);

        gpu.errors.push_back(ApiError::InvalidValue);
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 64, 32));
        assert_eq!(handle_at(&cache, 0x8000), first);
    }

    #[test]
    fn copy_over_decoded_entry_restores_memory() {
        let mut cache = new_cache(ram_with_texture(0x1000, 64));
        let mut gpu = MockBackend::new();
        let original = cache.memory().read_u32(0x1000).unwrap();

        let req = TextureRequest {
            stage: 0,
            address: 0x1000,
            width: 8,
            height: 8,
            format: 6,
            tlut_address: 0,
            tlut_format: 0,
            mode: TexMode::default(),
        };
        let decoded = cache.resolve(&mut gpu, &req).unwrap().texture().unwrap();
        assert_ne!(cache.memory().read_u32(0x1000), Some(original));

        cache.copy_render_target_to_texture(&mut gpu, &copy(0x1000, 8, 8));
        assert_eq!(cache.memory().read_u32(0x1000), Some(original));
        assert!(!gpu.live_textures.contains(&decoded.raw()));
        assert!(cache.entry(0x1000).unwrap().is_render_target());

        // Render-target entries skip the sentinel check entirely.
        cache.memory_mut().write_u32(0x1000, 0xDEAD_BEEF);
        let hit = cache.resolve(&mut gpu, &req).unwrap();
        assert!(hit.is_render_target());
    }

    // ── shared resources ──────────────────────────────────────────────────

    #[test]
    fn framebuffer_and_depth_target_are_pooled() {
        let mut cache = new_cache(ram_with_texture(0x1000, 64));
        let mut gpu = MockBackend::new();
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x8000, 64, 32));
        cache.copy_render_target_to_texture(&mut gpu, &copy(0x9000, 64, 32));
        cache.copy_render_target_to_texture(&mut gpu, &copy(0xA000, 32, 32));

        assert_eq!(gpu.count(|c| matches!(c, Call::CreateFramebuffer(_))), 1);
        assert_eq!(gpu.count(|c| matches!(c, Call::CreateRenderbuffer(..))), 2);
        assert_eq!(cache.depth_targets().len(), 2);
    }

    #[test]
    fn depth_copy_samples_depth_buffer() {
        let mut cache = new_cache(ram_with_texture(0x1000, 64));
        let mut gpu = MockBackend::new();
        let mut c = copy(0x8000, 64, 32);
        c.from_depth = true;
        c.copy_format = 6;
        cache.copy_render_target_to_texture(&mut gpu, &c);

        assert!(gpu.position(&Call::BindTexture(TextureTarget::Rect, TextureHandle::new(EFB_DEPTH))).is_some());
        assert!(gpu.position(&Call::BindTexture(TextureTarget::Rect, TextureHandle::new(EFB_COLOR))).is_none());
        let last = gpu.calls.last().unwrap();
        assert_eq!(*last, Call::DepthBufferRender);
    }
}
