mod args;

use anyhow::{Context, Result};
use clap::Parser;

use gxtex_engine::decode::LinearRgba8Decoder;
use gxtex_engine::device::{Gpu, WgpuBackend};
use gxtex_engine::gfx::{drain_errors, GraphicsApi, TextureTarget};
use gxtex_engine::logging::init_logging;
use gxtex_engine::memory::{GuestMemory, GuestRam};
use gxtex_engine::{EfbCopy, SourceRect, TexMode, TextureCache, TextureRequest};

use args::Args;

const RAM_BASE: u32 = 0x8000_0000;
const RAM_SIZE: usize = 24 * 1024 * 1024;

/// Direct-color format code (RGBA8) and the paletted code the linear decoder accepts.
const FMT_RGBA8: u32 = 6;
const FMT_PALETTED: u32 = LinearRgba8Decoder::PALETTED_FORMAT;

const TLUT_ADDR: u32 = RAM_BASE + 0x0010_0000;
const COPY_ADDR: u32 = RAM_BASE + 0x0080_0000;
const DEPTH_COPY_ADDR: u32 = RAM_BASE + 0x0090_0000;

/// One texture the scene samples every frame.
struct SceneTexture {
    address: u32,
    width: u32,
    height: u32,
    format: u32,
    mode: TexMode,
    /// Sampled only until `--stream-until`.
    streamed: bool,
}

fn scene() -> Vec<SceneTexture> {
    vec![
        // Mipmapped, trilinear, repeat.
        SceneTexture {
            address: RAM_BASE + 0x0001_0000,
            width: 64,
            height: 64,
            format: FMT_RGBA8,
            mode: TexMode::new(1, 1, true, 6),
            streamed: false,
        },
        // Non-power-of-two: rectangle target.
        SceneTexture {
            address: RAM_BASE + 0x0002_0000,
            width: 40,
            height: 24,
            format: FMT_RGBA8,
            mode: TexMode::new(0, 0, true, 4),
            streamed: false,
        },
        // Paletted.
        SceneTexture {
            address: RAM_BASE + 0x0003_0000,
            width: 32,
            height: 32,
            format: FMT_PALETTED,
            mode: TexMode::new(2, 2, false, 0),
            streamed: false,
        },
        // Streamed textures that stop being used and age out.
        SceneTexture {
            address: RAM_BASE + 0x0004_0000,
            width: 128,
            height: 32,
            format: FMT_RGBA8,
            mode: TexMode::new(0, 1, true, 5),
            streamed: true,
        },
        SceneTexture {
            address: RAM_BASE + 0x0006_0000,
            width: 16,
            height: 16,
            format: FMT_RGBA8,
            mode: TexMode::new(1, 0, false, 1),
            streamed: true,
        },
    ]
}

fn pattern(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = x.wrapping_mul(31) ^ y.wrapping_mul(17) ^ seed.wrapping_mul(0x9E37_79B9);
            out.extend_from_slice(&[v as u8, (v >> 8) as u8, (x * 255 / width.max(1)) as u8, 255]);
        }
    }
    out
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.logging());

    if args.dump_textures {
        std::fs::create_dir_all(&args.dump_path)
            .with_context(|| format!("failed to create dump directory {}", args.dump_path.display()))?;
    }

    let gpu = pollster::block_on(Gpu::new(args.gpu_init())).context("GPU initialization failed")?;
    let info = gpu.adapter_info();
    let mut backend = WgpuBackend::new(gpu);

    // Guest memory with every scene texture and the palette in place.
    let mut ram = GuestRam::new(RAM_BASE, RAM_SIZE);
    let textures = scene();
    for (i, tex) in textures.iter().enumerate() {
        ram.write(tex.address, &pattern(tex.width, tex.height, i as u32));
    }
    ram.write(TLUT_ADDR, &pattern(16, 1, 99));

    let mut cache = TextureCache::new(ram, LinearRgba8Decoder, args.texture_config());

    let (efb_w, efb_h) = (args.efb_width, args.efb_height);
    let efb_pixels = pattern(efb_w, efb_h, 7);
    backend
        .write_render_target(&efb_pixels)
        .context("failed to fill the framebuffer")?;
    backend
        .write_depth_buffer(&pattern(efb_w, efb_h, 8))
        .context("failed to fill the depth buffer")?;

    log::info!(
        "replaying {} frames on {} ({:?}), efb {efb_w}x{efb_h}",
        args.frames,
        info.name,
        info.backend
    );

    let mut misses = 0u64;
    for frame in 0..args.frames {
        cache.set_frame(frame);

        if args.rewrite_every > 0 && frame > 0 && frame % args.rewrite_every == 0 {
            let tex = &textures[0];
            cache
                .memory_mut()
                .write(tex.address, &pattern(tex.width, tex.height, frame as u32));
        }
        if frame == args.frames / 2 {
            // Palette swap: the paletted texture must be rebuilt.
            cache.memory_mut().write(TLUT_ADDR, &pattern(16, 1, 100));
        }

        // Draw: resolve every live texture on its own stage.
        let mut stage = 0u32;
        for tex in textures.iter().filter(|t| !t.streamed || frame < args.stream_until) {
            let req = TextureRequest {
                stage,
                address: tex.address,
                width: tex.width,
                height: tex.height,
                format: tex.format,
                tlut_address: TLUT_ADDR,
                tlut_format: 0,
                mode: tex.mode,
            };
            match cache.resolve(&mut backend, &req).map(|e| e.target()) {
                Some(TextureTarget::Tex2D) => cache.enable_tex_2d(&mut backend, stage),
                Some(TextureTarget::Rect) => cache.enable_tex_rect(&mut backend, stage),
                None => misses += 1,
            }
            stage += 1;
        }

        // Copy the framebuffer out at half size, and the depth buffer every fourth frame.
        cache.copy_render_target_to_texture(
            &mut backend,
            &EfbCopy {
                address: COPY_ADDR,
                from_depth: false,
                intensity: frame % 3 == 0,
                copy_format: if frame % 3 == 0 { 1 } else { FMT_RGBA8 },
                scale_by_half: true,
                source: SourceRect::new(0, 0, efb_w as i32, efb_h as i32),
            },
        );
        if frame % 4 == 0 {
            cache.copy_render_target_to_texture(
                &mut backend,
                &EfbCopy {
                    address: DEPTH_COPY_ADDR,
                    from_depth: true,
                    intensity: false,
                    copy_format: 6,
                    scale_by_half: false,
                    source: SourceRect::new(16, 16, 144, 112),
                },
            );
        }

        // The copy is sampled like any texture; it never fails validation.
        let copy_req = TextureRequest {
            stage,
            address: COPY_ADDR,
            width: efb_w / 2,
            height: efb_h / 2,
            format: FMT_RGBA8,
            tlut_address: 0,
            tlut_format: 0,
            mode: TexMode::new(0, 0, true, 4),
        };
        if cache.resolve(&mut backend, &copy_req).is_none() {
            misses += 1;
        }

        for s in 0..=stage {
            cache.disable_stage(&mut backend, s);
        }
        backend.take_viewport_changed();
        backend.take_depth_buffer_render();

        let errors = drain_errors(&mut backend, "frame");
        if errors > 0 {
            log::warn!("frame {frame}: {errors} graphics api errors");
        }

        cache.cleanup(&mut backend, frame);
    }

    let stats = cache.stats();
    println!("frames replayed        {}", args.frames);
    println!("textures created       {}", stats.textures_created);
    println!("textures alive         {}", stats.textures_alive);
    println!("render-target copies   {}", stats.render_target_copies);
    println!("invalidations          {}", stats.invalidations);
    println!("evictions              {}", stats.evictions);
    println!("textures dumped        {}", stats.dumped);
    println!("unresolved lookups     {misses}");
    println!("depth targets pooled   {}", cache.depth_targets().len());
    println!("quads drawn            {}", backend.draw_count());

    cache.shutdown(&mut backend);
    let first_word = cache
        .memory()
        .read_u32(textures[0].address)
        .map(|w| format!("{w:#010x}"))
        .unwrap_or_else(|| "unmapped".to_owned());
    log::debug!(
        "after shutdown: {} textures, {} framebuffers, {} renderbuffers; first word {first_word}",
        backend.texture_count(),
        backend.framebuffer_count(),
        backend.renderbuffer_count(),
    );
    if backend.get_error().is_some() {
        log::warn!("graphics api errors pending at shutdown");
    }

    Ok(())
}
