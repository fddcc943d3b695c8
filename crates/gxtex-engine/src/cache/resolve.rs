use crate::decode::{expanded_width, TextureDecoder};
use crate::gfx::{GraphicsApi, ImageUpload, PixelFormat, TextureTarget};
use crate::memory::GuestMemory;
use crate::resources;

use super::dump::dump_texture;
use super::entry::{CacheEntry, TextureRequest};
use super::palette::{palette_hash, PALETTE_HASH_BYTES, PALETTE_HASH_SEED};
use super::sampler::apply_sampler_state;
use super::{release_entry, TextureCache, SENTINEL_OFFSET};

impl<M: GuestMemory, D: TextureDecoder> TextureCache<M, D> {
    /// Resolves `request` to a texture bound on its target at unit `request.stage`.
    ///
    /// Returns `None` when there is nothing to sample (zero address, unmapped
    /// memory, empty size); the caller skips the draw.
    pub fn resolve<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        request: &TextureRequest,
    ) -> Option<&CacheEntry> {
        if request.address == 0 {
            return None;
        }

        let pal_hash = self.request_palette_hash(request);

        let valid = self
            .entries
            .get(&request.address)
            .map(|entry| entry_is_valid(&self.memory, entry, request, pal_hash));

        match valid {
            Some(true) => return self.refresh(api, request),
            Some(false) => {
                if let Some(mut stale) = self.entries.remove(&request.address) {
                    log::debug!("texture {:#010x} changed; reloading", request.address);
                    self.stats.invalidations += 1;
                    release_entry(api, &mut self.memory, &mut stale);
                }
            }
            None => {}
        }

        self.load(api, request, pal_hash)
    }

    fn request_palette_hash(&self, request: &TextureRequest) -> u32 {
        let size = self.decoder.palette_size(request.format).min(PALETTE_HASH_BYTES);
        if size == 0 {
            return PALETTE_HASH_SEED;
        }
        match self.memory.slice(request.tlut_address) {
            Some(pal) => palette_hash(&pal[..size.min(pal.len())]),
            None => PALETTE_HASH_SEED,
        }
    }

    fn refresh<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        request: &TextureRequest,
    ) -> Option<&CacheEntry> {
        let entry = self.entries.get_mut(&request.address)?;
        entry.last_used_frame = self.frame;

        api.active_texture(request.stage);
        api.bind_texture(entry.target(), entry.texture);
        if entry.sampler != Some(request.mode) {
            apply_sampler_state(api, entry, request.mode, &self.config);
        }
        Some(entry)
    }

    fn load<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        request: &TextureRequest,
        pal_hash: u32,
    ) -> Option<&CacheEntry> {
        let TextureRequest { stage, address, width, height, format, tlut_address, tlut_format, mode } =
            *request;

        if width == 0 || height == 0 {
            log::warn!("texture {address:#010x} has empty size {width}x{height}");
            return None;
        }

        let Some(src) = self.memory.slice(address) else {
            log::warn!("texture {address:#010x} is outside guest memory");
            return None;
        };

        let expanded = expanded_width(&self.decoder, width, format);
        let len = expanded as usize * height as usize * PixelFormat::BYTES_PER_PIXEL;
        if self.scratch.len() < len {
            self.scratch.resize(len, 0);
        }
        let layout = self.decoder.decode(
            &mut self.scratch[..len],
            src,
            expanded,
            height,
            format,
            tlut_address,
            tlut_format,
        );

        let is_non_pow2 = !width.is_power_of_two() || !height.is_power_of_two();
        let target = if is_non_pow2 { TextureTarget::Rect } else { TextureTarget::Tex2D };

        let texture = resources::allocate_texture(api);
        api.active_texture(stage);
        api.bind_texture(target, Some(texture));

        let image = ImageUpload {
            width,
            height,
            row_length: expanded,
            format: layout,
            pixels: Some(&self.scratch[..len]),
        };
        let has_mipmaps = !is_non_pow2 && mode.wants_mipmaps();
        if has_mipmaps {
            api.build_mipmaps(&image);
        } else {
            api.tex_image_2d(target, &image);
        }

        // Decoding is done; plant the sentinel over the first texel word.
        let sentinel = self.next_sentinel();
        let word = address.wrapping_add(SENTINEL_OFFSET * 4);
        let original_pixel = match self.memory.read_u32(word) {
            Some(original) => {
                self.memory.write_u32(word, sentinel);
                original
            }
            None => {
                log::warn!("texture {address:#010x}: no room for sentinel; it will reload on every use");
                0
            }
        };

        let mut entry = CacheEntry {
            address,
            texture: Some(texture),
            width,
            height,
            format,
            is_non_pow2,
            is_render_target: false,
            has_mipmaps,
            sentinel_offset: SENTINEL_OFFSET,
            sentinel,
            palette_hash: pal_hash,
            original_pixel,
            last_used_frame: self.frame,
            sampler: None,
        };
        apply_sampler_state(api, &mut entry, mode, &self.config);

        if self.config.dump_textures {
            let index = self.dump_index;
            self.dump_index += 1;
            match dump_texture(
                &self.config.tex_dump_path,
                index,
                format,
                &self.scratch[..len],
                width,
                height,
                expanded,
                layout,
            ) {
                Ok(path) => {
                    self.stats.dumped += 1;
                    log::debug!("dumped texture {address:#010x} to {}", path.display());
                }
                Err(err) => log::warn!("texture dump failed: {err:#}"),
            }
        }

        self.stats.textures_created += 1;
        log::debug!(
            "loaded texture {address:#010x} {width}x{height} fmt {format} ({} cached)",
            self.entries.len() + 1
        );

        self.entries.insert(address, entry);
        self.entries.get(&address)
    }
}

/// A cached decode stays valid while its sentinel word and palette are intact
/// and the request still describes the same image. Render-target entries are
/// always valid.
fn entry_is_valid<M: GuestMemory>(
    memory: &M,
    entry: &CacheEntry,
    request: &TextureRequest,
    pal_hash: u32,
) -> bool {
    if entry.is_render_target {
        return true;
    }
    // Geometry and format are checked too: the same address can be sampled
    // with a different layout without the sentinel word changing.
    entry.width == request.width
        && entry.height == request.height
        && entry.format == request.format
        && entry.palette_hash == pal_hash
        && memory.read_u32(entry.sentinel_address()) == Some(entry.sentinel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::{new_cache, ram_with_texture, request, with_config};
    use crate::cache::TexMode;
    use crate::config::TextureConfig;
    use crate::decode::LinearRgba8Decoder;
    use crate::gfx::mock::{Call, MockBackend};
    use crate::gfx::{MagFilter, TextureHandle};
    use crate::memory::GuestRam;

    fn handle(entry: Option<&CacheEntry>) -> TextureHandle {
        entry.unwrap().texture().unwrap()
    }

    // ── hits and misses ───────────────────────────────────────────────────

    #[test]
    fn zero_address_resolves_to_nothing() {
        let mut cache = new_cache(ram_with_texture(0x1000, 256));
        let mut gpu = MockBackend::new();
        assert!(cache.resolve(&mut gpu, &request(0, 8, 8)).is_none());
        assert!(gpu.calls.is_empty());
    }

    #[test]
    fn unmapped_or_empty_textures_are_skipped() {
        let mut cache = new_cache(ram_with_texture(0x1000, 256));
        let mut gpu = MockBackend::new();
        assert!(cache.resolve(&mut gpu, &request(0x8000_0000, 8, 8)).is_none());
        assert!(cache.resolve(&mut gpu, &request(0x1000, 0, 8)).is_none());
        assert!(cache.is_empty());
        assert!(gpu.live_textures.is_empty());
    }

    #[test]
    fn unchanged_texture_hits() {
        let mut cache = new_cache(ram_with_texture(0x1000, 256));
        let mut gpu = MockBackend::new();
        let first = handle(cache.resolve(&mut gpu, &request(0x1000, 8, 8)));

        gpu.clear_calls();
        cache.set_frame(5);
        let mut req = request(0x1000, 8, 8);
        req.stage = 2;
        let second = handle(cache.resolve(&mut gpu, &req));

        assert_eq!(first, second);
        assert_eq!(
            gpu.calls,
            vec![Call::ActiveTexture(2), Call::BindTexture(TextureTarget::Tex2D, Some(first))]
        );
        assert_eq!(cache.entry(0x1000).unwrap().last_used_frame(), 5);
        assert_eq!(cache.stats().textures_created, 1);
    }

    #[test]
    fn sentinel_replaces_first_word() {
        let mut cache = new_cache(ram_with_texture(0x1000, 256));
        let mut gpu = MockBackend::new();
        let original = cache.memory().read_u32(0x1000).unwrap();

        cache.resolve(&mut gpu, &request(0x1000, 8, 8)).unwrap();
        let e = cache.entry(0x1000).unwrap();
        assert_eq!(e.original_pixel(), original);
        assert_eq!(cache.memory().read_u32(0x1000), Some(e.sentinel()));
        assert!(!e.is_render_target());
    }

    #[test]
    fn rewritten_texture_reloads() {
        let mut cache = new_cache(ram_with_texture(0x1000, 256));
        let mut gpu = MockBackend::new();
        let original = cache.memory().read_u32(0x1000).unwrap();
        let first = handle(cache.resolve(&mut gpu, &request(0x1000, 8, 8)));

        // The guest rewrites the texture, including the sentinel word.
        cache.memory_mut().write_u32(0x1000, original);
        let second = handle(cache.resolve(&mut gpu, &request(0x1000, 8, 8)));
        assert_ne!(first, second);
        assert!(!gpu.live_textures.contains(&first.raw()));
        assert_eq!(cache.stats().invalidations, 1);
        assert_eq!(cache.entry(0x1000).unwrap().original_pixel(), original);

        cache.invalidate(&mut gpu);
        assert_eq!(cache.memory().read_u32(0x1000), Some(original));
    }

    #[test]
    fn size_or_format_change_reloads() {
        let mut cache = new_cache(ram_with_texture(0x1000, 1024));
        let mut gpu = MockBackend::new();
        let a = handle(cache.resolve(&mut gpu, &request(0x1000, 8, 8)));
        let b = handle(cache.resolve(&mut gpu, &request(0x1000, 16, 8)));
        assert_ne!(a, b);

        let mut req = request(0x1000, 16, 8);
        req.format = 4;
        let c = handle(cache.resolve(&mut gpu, &req));
        assert_ne!(b, c);
        assert_eq!(gpu.live_textures.len(), 1);
    }

    #[test]
    fn palette_change_reloads() {
        let mut ram = ram_with_texture(0x1000, 256);
        ram.write(0x4000, &[7u8; 32]);
        let mut cache = new_cache(ram);
        let mut gpu = MockBackend::new();

        let mut req = request(0x1000, 8, 8);
        req.format = LinearRgba8Decoder::PALETTED_FORMAT;
        req.tlut_address = 0x4000;

        let first = handle(cache.resolve(&mut gpu, &req));
        assert_eq!(handle(cache.resolve(&mut gpu, &req)), first);

        cache.memory_mut().write(0x4003, &[8]);
        let second = handle(cache.resolve(&mut gpu, &req));
        assert_ne!(first, second);
        assert_eq!(cache.entry(0x1000).unwrap().palette_hash(), palette_hash(&{
            let mut p = [7u8; 16];
            p[3] = 8;
            p
        }));
    }

    #[test]
    fn direct_color_uses_seed_hash() {
        let mut cache = new_cache(ram_with_texture(0x1000, 256));
        let mut gpu = MockBackend::new();
        let e = cache.resolve(&mut gpu, &request(0x1000, 8, 8)).unwrap();
        assert_eq!(e.palette_hash(), PALETTE_HASH_SEED);
    }

    // ── uploads ───────────────────────────────────────────────────────────

    #[test]
    fn mipmapped_mode_builds_mip_chain() {
        let mut cache = new_cache(ram_with_texture(0x1000, 256));
        let mut gpu = MockBackend::new();
        let mut req = request(0x1000, 8, 8);
        req.mode = TexMode::new(0, 0, true, 6);
        let e = cache.resolve(&mut gpu, &req).unwrap();
        assert!(e.has_mipmaps());
        assert_eq!(gpu.count(|c| matches!(c, Call::BuildMipmaps { width: 8, height: 8 })), 1);
        assert_eq!(gpu.count(|c| matches!(c, Call::TexImage { .. })), 0);
    }

    #[test]
    fn plain_mode_uploads_level_zero() {
        let mut cache = new_cache(ram_with_texture(0x1000, 256));
        let mut gpu = MockBackend::new();
        let e = cache.resolve(&mut gpu, &request(0x1000, 8, 8)).unwrap();
        assert!(!e.has_mipmaps());
        assert_eq!(e.target(), TextureTarget::Tex2D);
        assert!(gpu
            .position(&Call::TexImage {
                target: TextureTarget::Tex2D,
                width: 8,
                height: 8,
                row_length: 8,
                has_pixels: true,
            })
            .is_some());
    }

    #[test]
    fn non_pow2_uses_rect_with_expanded_rows() {
        let mut cache = new_cache(ram_with_texture(0x1000, 256));
        let mut gpu = MockBackend::new();
        let mut req = request(0x1000, 5, 4);
        req.mode = TexMode::new(0, 0, true, 5);
        let e = cache.resolve(&mut gpu, &req).unwrap();

        assert!(e.is_non_pow2());
        assert!(!e.has_mipmaps());
        assert_eq!(e.target(), TextureTarget::Rect);
        assert!(gpu
            .position(&Call::TexImage {
                target: TextureTarget::Rect,
                width: 5,
                height: 4,
                row_length: 8,
                has_pixels: true,
            })
            .is_some());
        assert_eq!(gpu.count(|c| matches!(c, Call::BuildMipmaps { .. })), 0);
    }

    #[test]
    fn upload_binds_on_requested_unit() {
        let mut cache = new_cache(ram_with_texture(0x1000, 256));
        let mut gpu = MockBackend::new();
        let mut req = request(0x1000, 8, 8);
        req.stage = 3;
        let tex = handle(cache.resolve(&mut gpu, &req));
        let active = gpu.position(&Call::ActiveTexture(3)).unwrap();
        let bind = gpu.position(&Call::BindTexture(TextureTarget::Tex2D, Some(tex))).unwrap();
        assert!(active < bind);
    }

    // ── sampler state ─────────────────────────────────────────────────────

    #[test]
    fn sampler_reapplied_only_on_change() {
        let mut cache = new_cache(ram_with_texture(0x1000, 256));
        let mut gpu = MockBackend::new();
        let mut req = request(0x1000, 8, 8);
        cache.resolve(&mut gpu, &req).unwrap();
        cache.resolve(&mut gpu, &req).unwrap();
        assert_eq!(gpu.count(|c| matches!(c, Call::MagFilter(..))), 1);

        req.mode = TexMode::new(1, 1, false, 0);
        cache.resolve(&mut gpu, &req).unwrap();
        assert_eq!(gpu.count(|c| matches!(c, Call::MagFilter(..))), 2);
        assert!(gpu.position(&Call::MagFilter(TextureTarget::Tex2D, MagFilter::Nearest)).is_some());
        assert_eq!(cache.entry(0x1000).unwrap().sampler(), Some(req.mode));
        assert_eq!(cache.stats().textures_created, 1);
    }

    // ── dumping ───────────────────────────────────────────────────────────

    #[test]
    fn dump_writes_png_per_upload() {
        let dir = std::env::temp_dir().join(format!("gxtex-resolve-dump-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let config = TextureConfig { dump_textures: true, tex_dump_path: dir.clone(), ..Default::default() };
        let mut cache = with_config(ram_with_texture(0x1000, 256), config);
        let mut gpu = MockBackend::new();

        cache.resolve(&mut gpu, &request(0x1000, 8, 8)).unwrap();
        cache.resolve(&mut gpu, &request(0x1000, 8, 8)).unwrap();
        assert!(dir.join("txt_0000_6.png").exists());
        assert!(!dir.join("txt_0001_6.png").exists());
        assert_eq!(cache.stats().dumped, 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn dump_failure_does_not_block_upload() {
        let config = TextureConfig {
            dump_textures: true,
            tex_dump_path: std::env::temp_dir().join("gxtex-no-such-dir").join("nested"),
            ..Default::default()
        };
        let mut cache = with_config(ram_with_texture(0x1000, 256), config);
        let mut gpu = MockBackend::new();
        assert!(cache.resolve(&mut gpu, &request(0x1000, 8, 8)).is_some());
        assert_eq!(cache.stats().dumped, 0);
    }

    #[test]
    fn validity_checks_sentinel_word() {
        let mut ram = GuestRam::new(0, 64);
        ram.write_u32(0x10, 0xAAAA_AAAA);
        let mut entry = CacheEntry::render_target(0x10, TextureHandle::new(1).unwrap(), 8, 8, 6, 0);
        entry.is_render_target = false;
        entry.sentinel = 0xAAAA_AAAA;
        entry.palette_hash = PALETTE_HASH_SEED;
        let req = request(0x10, 8, 8);

        assert!(entry_is_valid(&ram, &entry, &req, PALETTE_HASH_SEED));
        assert!(!entry_is_valid(&ram, &entry, &req, 1));
        ram.write_u32(0x10, 0);
        assert!(!entry_is_valid(&ram, &entry, &req, PALETTE_HASH_SEED));
        entry.is_render_target = true;
        assert!(entry_is_valid(&ram, &entry, &req, 1));
    }
}
