use std::path::PathBuf;

/// Texture cache configuration.
///
/// Read-only for the cache's lifetime; rebuild the cache to change it.
#[derive(Debug, Clone)]
pub struct TextureConfig {
    /// Force linear magnification/minification regardless of guest sampler state.
    pub force_filtering: bool,

    /// Request maximum anisotropic filtering on power-of-two textures.
    pub force_max_anisotropy: bool,

    /// Write every freshly decoded texture to `tex_dump_path` as PNG.
    pub dump_textures: bool,

    /// Directory for texture dumps. Must exist.
    pub tex_dump_path: PathBuf,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            force_filtering: false,
            force_max_anisotropy: false,
            dump_textures: false,
            tex_dump_path: PathBuf::from("dump/textures"),
        }
    }
}
