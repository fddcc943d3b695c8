/// Counters kept by the texture cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Textures decoded and uploaded since creation.
    pub textures_created: u64,
    /// Entries currently cached (decoded and render-target).
    pub textures_alive: usize,
    /// Render-target copies performed.
    pub render_target_copies: u64,
    /// Entries rebuilt because their backing memory or palette changed.
    pub invalidations: u64,
    /// Entries evicted as stale.
    pub evictions: u64,
    /// Textures written to disk.
    pub dumped: u64,
}
