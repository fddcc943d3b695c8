use std::fmt;
use std::num::NonZeroU32;

// ── handles ───────────────────────────────────────────────────────────────

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wraps a raw API name. Zero is the API's "no object" and yields `None`.
            #[inline]
            pub const fn new(raw: u32) -> Option<Self> {
                match NonZeroU32::new(raw) {
                    Some(n) => Some(Self(n)),
                    None => None,
                }
            }

            #[inline]
            pub const fn from_nonzero(raw: NonZeroU32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0.get()
            }
        }
    };
}

handle!(
    /// GPU texture object.
    TextureHandle
);
handle!(
    /// Off-screen framebuffer object.
    FramebufferHandle
);
handle!(
    /// Depth renderbuffer object.
    RenderbufferHandle
);
handle!(
    /// Compiled shader program.
    ProgramHandle
);

// ── enums ─────────────────────────────────────────────────────────────────

/// Texture binding target.
///
/// `Rect` is the non-mipmapped target with unnormalized coordinates used for
/// non-power-of-two sizes and render-target copies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Tex2D,
    Rect,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MagFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapNearest,
    LinearMipmapLinear,
}

impl MinFilter {
    #[inline]
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, MinFilter::Nearest | MinFilter::Linear)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Pixel layout of an upload buffer. Both layouts are 4 bytes per pixel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
}

impl PixelFormat {
    pub const BYTES_PER_PIXEL: usize = 4;
}

/// One level-0 image upload.
///
/// `row_length` is the pitch of `pixels` in pixels; it is larger than `width`
/// when the decoder expanded rows to a block boundary. `pixels = None`
/// allocates storage without initializing it.
#[derive(Debug, Copy, Clone)]
pub struct ImageUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub row_length: u32,
    pub format: PixelFormat,
    pub pixels: Option<&'a [u8]>,
}

impl<'a> ImageUpload<'a> {
    /// Storage-only upload with a tightly packed row length.
    pub fn empty(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            row_length: width,
            format,
            pixels: None,
        }
    }
}

/// Vertex of the copy quad: clip-space position and source texel coordinate.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct QuadVertex {
    pub pos: [f32; 2],
    pub tex: [f32; 2],
}

// ── errors ────────────────────────────────────────────────────────────────

/// Error reported by the API's error query.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApiError {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    InvalidFramebufferOperation,
    OutOfMemory,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ApiError::InvalidEnum => "invalid enum",
            ApiError::InvalidValue => "invalid value",
            ApiError::InvalidOperation => "invalid operation",
            ApiError::InvalidFramebufferOperation => "invalid framebuffer operation",
            ApiError::OutOfMemory => "out of memory",
        };
        write!(f, "graphics api error: {msg}")
    }
}

impl std::error::Error for ApiError {}

// ── trait ─────────────────────────────────────────────────────────────────

/// Immediate-mode graphics API used by the texture cache.
///
/// Calls act on the currently selected texture unit and the texture bound on
/// the given target, the way fixed-function APIs do. Errors are not returned
/// per call; they queue up and are drained through [`GraphicsApi::get_error`].
pub trait GraphicsApi {
    fn create_texture(&mut self) -> TextureHandle;
    fn delete_texture(&mut self, texture: TextureHandle);
    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureHandle>);

    /// Defines level 0 of the texture bound on `target`.
    fn tex_image_2d(&mut self, target: TextureTarget, image: &ImageUpload<'_>);

    /// Defines the full mip chain of the texture bound on the 2D target.
    fn build_mipmaps(&mut self, image: &ImageUpload<'_>);

    fn set_mag_filter(&mut self, target: TextureTarget, filter: MagFilter);
    fn set_min_filter(&mut self, target: TextureTarget, filter: MinFilter);
    fn set_wrap(&mut self, target: TextureTarget, s: WrapMode, t: WrapMode);
    fn set_max_anisotropy(&mut self, target: TextureTarget, level: u16);

    fn active_texture(&mut self, unit: u32);
    fn enable(&mut self, target: TextureTarget);
    fn disable(&mut self, target: TextureTarget);

    fn create_framebuffer(&mut self) -> FramebufferHandle;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);
    fn create_depth_renderbuffer(&mut self, width: u32, height: u32) -> RenderbufferHandle;
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle);

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn bind_program(&mut self, program: Option<ProgramHandle>);

    /// Draws one quad (fan order) into the bound framebuffer, sampling unit 0.
    fn draw_quad(&mut self, vertices: &[QuadVertex; 4]);

    /// Pops the oldest queued error, if any.
    fn get_error(&mut self) -> Option<ApiError>;
}

/// Drains the error queue, logging what was pending. Returns the number drained.
pub fn drain_errors<A: GraphicsApi + ?Sized>(api: &mut A, context: &str) -> usize {
    let mut n = 0;
    while let Some(err) = api.get_error() {
        log::debug!("{context}: discarding pending {err}");
        n += 1;
        // A broken queue must not hang the caller.
        if n >= 32 {
            break;
        }
    }
    n
}
