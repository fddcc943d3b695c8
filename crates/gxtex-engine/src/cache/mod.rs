//! Address-keyed cache of guest textures.
//!
//! The guest gives no signal when it rewrites texture memory. On upload the
//! cache overwrites one word of the texture with a random sentinel and checks
//! it on every later lookup; a changed word (or palette) means the texture was
//! rewritten and must be decoded again. The overwritten word is put back
//! whenever an entry is destroyed while the sentinel is still in place.
//!
//! Render-target copies land in the same map but skip the sentinel entirely.

mod dump;
mod efb_copy;
mod entry;
mod palette;
mod resolve;
mod sampler;
mod stats;

pub use efb_copy::{copy_dimensions, copy_quad, EfbCopy, SourceRect};
pub use entry::{CacheEntry, TexMode, TextureRequest};
pub use palette::{palette_hash, PALETTE_HASH_BYTES, PALETTE_HASH_SEED};
pub use stats::CacheStats;

use std::collections::HashMap;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use crate::config::TextureConfig;
use crate::decode::TextureDecoder;
use crate::gfx::{FramebufferHandle, GraphicsApi};
use crate::memory::GuestMemory;
use crate::resources::{self, is_stale, DepthTargetPool};
use crate::stages::StageTracker;

/// Word offset of the sentinel inside a texture.
pub const SENTINEL_OFFSET: u32 = 0;

/// Initial decode buffer size (1024x1024 RGBA8); grows on demand.
const SCRATCH_SIZE: usize = 1024 * 1024 * 4;

/// GPU texture cache for one graphics context.
///
/// All methods must be called on the thread that owns the context.
pub struct TextureCache<M: GuestMemory, D: TextureDecoder> {
    memory: M,
    decoder: D,
    config: TextureConfig,

    entries: HashMap<u32, CacheEntry>,
    depth_targets: DepthTargetPool,
    scratch_framebuffer: Option<FramebufferHandle>,
    stages: StageTracker,

    scratch: Vec<u8>,
    rng: SmallRng,
    frame: u64,
    dump_index: u32,
    stats: CacheStats,
}

impl<M: GuestMemory, D: TextureDecoder> TextureCache<M, D> {
    /// Creates an empty cache. No GPU objects are created until first use.
    pub fn new(memory: M, decoder: D, config: TextureConfig) -> Self {
        Self::with_rng(memory, decoder, config, SmallRng::from_entropy())
    }

    /// Like [`TextureCache::new`] with a fixed sentinel sequence.
    pub fn with_seed(memory: M, decoder: D, config: TextureConfig, seed: u64) -> Self {
        Self::with_rng(memory, decoder, config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(memory: M, decoder: D, config: TextureConfig, rng: SmallRng) -> Self {
        log::debug!("texture cache init: {config:?}");
        Self {
            memory,
            decoder,
            config,
            entries: HashMap::new(),
            depth_targets: DepthTargetPool::new(),
            scratch_framebuffer: None,
            stages: StageTracker::new(),
            scratch: vec![0; SCRATCH_SIZE],
            rng,
            frame: 0,
            dump_index: 0,
            stats: CacheStats::default(),
        }
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &TextureConfig {
        &self.config
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Guest memory, for the emulator's own writes between frames.
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn entry(&self, address: u32) -> Option<&CacheEntry> {
        self.entries.get(&address)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { textures_alive: self.entries.len(), ..self.stats }
    }

    pub fn depth_targets(&self) -> &DepthTargetPool {
        &self.depth_targets
    }

    pub fn stages(&self) -> &StageTracker {
        &self.stages
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Sets the frame counter stamped on entries used from now on.
    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Destroys every cached texture (e.g. after context loss).
    pub fn invalidate<A: GraphicsApi + ?Sized>(&mut self, api: &mut A) {
        let n = self.entries.len();
        for (_, mut entry) in self.entries.drain() {
            release_entry(api, &mut self.memory, &mut entry);
        }
        if n > 0 {
            log::debug!("texture cache invalidated ({n} entries)");
        }
    }

    /// Disables every tracked stage, invalidates, and releases the depth pool
    /// and scratch framebuffer. The context stays usable afterwards.
    pub fn shutdown<A: GraphicsApi + ?Sized>(&mut self, api: &mut A) {
        self.stages.disable_all(api);
        self.invalidate(api);
        self.depth_targets.release_all(api);
        resources::destroy_framebuffer(api, &mut self.scratch_framebuffer);
        log::debug!("texture cache shut down");
    }

    /// Per-frame sweep: evicts entries and depth targets unused for more than
    /// 20 frames as of `frame`.
    pub fn cleanup<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, frame: u64) {
        self.frame = frame;

        let memory = &mut self.memory;
        let mut evicted = 0u64;
        self.entries.retain(|_, entry| {
            if is_stale(frame, entry.last_used_frame) {
                release_entry(api, memory, entry);
                evicted += 1;
                false
            } else {
                true
            }
        });
        self.stats.evictions += evicted;

        let depth = self.depth_targets.sweep(api, frame);
        if evicted > 0 || depth > 0 {
            log::debug!("cleanup @{frame}: evicted {evicted} textures, {depth} depth targets");
        }
    }

    // ── stage enablement ──────────────────────────────────────────────────

    pub fn enable_tex_2d<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, stage: u32) {
        self.stages.enable_tex_2d(api, stage);
    }

    pub fn enable_tex_rect<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, stage: u32) {
        self.stages.enable_tex_rect(api, stage);
    }

    pub fn disable_stage<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, stage: u32) {
        self.stages.disable_stage(api, stage);
    }

    fn next_sentinel(&mut self) -> u32 {
        self.rng.next_u32()
    }
}

/// Restores the guest word under a live sentinel and releases the texture.
fn release_entry<A: GraphicsApi + ?Sized, M: GuestMemory>(
    api: &mut A,
    memory: &mut M,
    entry: &mut CacheEntry,
) {
    if !entry.is_render_target {
        restore_guest_word(memory, entry);
    }
    resources::destroy_texture(api, &mut entry.texture);
}

/// Puts back the word the sentinel replaced, unless the guest has since
/// overwritten it.
fn restore_guest_word<M: GuestMemory>(memory: &mut M, entry: &CacheEntry) {
    let at = entry.sentinel_address();
    if memory.read_u32(at) == Some(entry.sentinel) {
        memory.write_u32(at, entry.original_pixel);
    }
}
