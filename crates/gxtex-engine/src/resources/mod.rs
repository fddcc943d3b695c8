//! GPU object lifecycle.
//!
//! Handles held in `Option` slots are released with the `destroy_*` helpers,
//! which empty the slot so a second call is a no-op.

mod depth_pool;

pub use depth_pool::{DepthTarget, DepthTargetPool};

use crate::gfx::{FramebufferHandle, GraphicsApi, TextureHandle};

/// Frames an unused cache entry or depth target survives before eviction.
pub const STALE_FRAMES: u64 = 20;

/// `true` once `last_used` is more than [`STALE_FRAMES`] behind `frame`.
#[inline]
pub fn is_stale(frame: u64, last_used: u64) -> bool {
    frame > last_used.saturating_add(STALE_FRAMES)
}

pub fn allocate_texture<A: GraphicsApi + ?Sized>(api: &mut A) -> TextureHandle {
    api.create_texture()
}

pub fn destroy_texture<A: GraphicsApi + ?Sized>(api: &mut A, slot: &mut Option<TextureHandle>) {
    if let Some(texture) = slot.take() {
        api.delete_texture(texture);
    }
}

/// Returns the framebuffer in `slot`, creating it on first use.
pub fn ensure_framebuffer<A: GraphicsApi + ?Sized>(
    api: &mut A,
    slot: &mut Option<FramebufferHandle>,
) -> FramebufferHandle {
    *slot.get_or_insert_with(|| api.create_framebuffer())
}

pub fn destroy_framebuffer<A: GraphicsApi + ?Sized>(api: &mut A, slot: &mut Option<FramebufferHandle>) {
    if let Some(framebuffer) = slot.take() {
        api.delete_framebuffer(framebuffer);
    }
}
