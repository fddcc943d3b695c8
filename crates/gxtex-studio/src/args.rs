use std::path::PathBuf;

use clap::Parser;

use gxtex_engine::device::GpuInit;
use gxtex_engine::logging::LoggingConfig;
use gxtex_engine::TextureConfig;

/// Replays a synthetic frame sequence through the texture cache on a
/// headless wgpu device and prints cache statistics.
#[derive(Parser, Debug)]
#[command(name = "gxtex-studio")]
#[command(about = "Drive the gxtex texture cache against a headless GPU", long_about = None)]
pub struct Args {
    /// Number of frames to replay
    #[arg(short, long, default_value_t = 120)]
    pub frames: u64,

    /// Emulated framebuffer width
    #[arg(long, default_value_t = 640)]
    pub efb_width: u32,

    /// Emulated framebuffer height
    #[arg(long, default_value_t = 528)]
    pub efb_height: u32,

    /// Rewrite the first texture every N frames (0 = never)
    #[arg(long, default_value_t = 30)]
    pub rewrite_every: u64,

    /// Stop touching the streamed textures after this frame so they age out
    #[arg(long, default_value_t = 60)]
    pub stream_until: u64,

    /// Force linear filtering
    #[arg(long)]
    pub force_filtering: bool,

    /// Force maximum anisotropic filtering
    #[arg(long)]
    pub force_anisotropy: bool,

    /// Dump every decoded texture as PNG
    #[arg(long)]
    pub dump_textures: bool,

    /// Directory for texture dumps
    #[arg(long, default_value = "dump/textures")]
    pub dump_path: PathBuf,

    /// Use the software fallback adapter
    #[arg(long)]
    pub fallback_adapter: bool,

    /// Log cache traffic at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Prefix log lines with millisecond timestamps
    #[arg(long)]
    pub log_timestamps: bool,
}

impl Args {
    pub fn texture_config(&self) -> TextureConfig {
        TextureConfig {
            force_filtering: self.force_filtering,
            force_max_anisotropy: self.force_anisotropy,
            dump_textures: self.dump_textures,
            tex_dump_path: self.dump_path.clone(),
        }
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            cache_traffic: self.verbose,
            timestamps: self.log_timestamps,
            ..LoggingConfig::default()
        }
    }

    pub fn gpu_init(&self) -> GpuInit {
        GpuInit {
            force_fallback_adapter: self.fallback_adapter,
            efb_width: self.efb_width,
            efb_height: self.efb_height,
            ..GpuInit::default()
        }
    }
}
