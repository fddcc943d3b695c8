use std::collections::HashMap;

use crate::gfx::{GraphicsApi, RenderbufferHandle};

use super::is_stale;

/// Pooled depth renderbuffer for one resolution.
#[derive(Debug, Copy, Clone)]
pub struct DepthTarget {
    pub handle: RenderbufferHandle,
    pub last_used_frame: u64,
}

/// Depth renderbuffers shared by all render-target copies, one per resolution.
#[derive(Debug, Default)]
pub struct DepthTargetPool {
    targets: HashMap<(u32, u32), DepthTarget>,
}

impl DepthTargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the renderbuffer for `width x height`, creating it on first use.
    pub fn acquire<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        width: u32,
        height: u32,
        frame: u64,
    ) -> RenderbufferHandle {
        let target = self.targets.entry((width, height)).or_insert_with(|| {
            log::debug!("creating {width}x{height} depth target");
            DepthTarget {
                handle: api.create_depth_renderbuffer(width, height),
                last_used_frame: frame,
            }
        });
        target.last_used_frame = frame;
        target.handle
    }

    /// Deletes targets unused for more than the staleness window.
    pub fn sweep<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, frame: u64) -> usize {
        let before = self.targets.len();
        self.targets.retain(|_, t| {
            if is_stale(frame, t.last_used_frame) {
                api.delete_renderbuffer(t.handle);
                false
            } else {
                true
            }
        });
        before - self.targets.len()
    }

    pub fn release_all<A: GraphicsApi + ?Sized>(&mut self, api: &mut A) {
        for (_, t) in self.targets.drain() {
            api.delete_renderbuffer(t.handle);
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, width: u32, height: u32) -> Option<&DepthTarget> {
        self.targets.get(&(width, height))
    }
}
