use crate::foundation::core::Argb;
use crate::foundation::error::SubrastResult;
use crate::scene::cue::RenderRequest;

/// Sanity ceiling on the claimed pixel count of a single tile.
///
/// Tiles above this are malformed and dropped; oversized-but-plausible
/// geometry below it is left to the union-box allocation guard.
pub const MAX_TILE_PIXELS: u64 = 1 << 32;

/// Full-color tile: straight-alpha RGBA8 pixels at a destination offset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RgbaTile {
    /// Destination x offset on the target canvas.
    pub x: i32,
    /// Destination y offset on the target canvas.
    pub y: i32,
    /// Tile width in pixels.
    pub width: u32,
    /// Tile height in pixels.
    pub height: u32,
    /// Row stride in pixels; must be >= `width`.
    pub stride: u32,
    /// Row-major RGBA8 bytes, straight (non-premultiplied) alpha.
    pub pixels: Vec<u8>,
}

/// Coverage tile: one alpha byte per pixel plus a single solid fill color.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverageTile {
    /// Destination x offset on the target canvas.
    pub x: i32,
    /// Destination y offset on the target canvas.
    pub y: i32,
    /// Tile width in pixels.
    pub width: u32,
    /// Tile height in pixels.
    pub height: u32,
    /// Row stride in pixels; must be >= `width`.
    pub stride: u32,
    /// Row-major coverage bytes; zero means "not touched".
    pub coverage: Vec<u8>,
    /// Solid ARGB color applied wherever coverage is non-zero.
    pub color: Argb,
}

/// What the external rasterizer produced for one cue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RasterOutput {
    /// Nothing visible (e.g. a cue that is all whitespace).
    #[default]
    Empty,
    /// Full-color tiles.
    Rgba(Vec<RgbaTile>),
    /// Coverage masks, each with one solid color.
    Coverage(Vec<CoverageTile>),
}

/// The external text-shaping/rasterization collaborator.
///
/// Implementations are called concurrently from render worker threads; a
/// backend that is not thread-safe must serialize internally before
/// implementing this trait.
pub trait Rasterizer: Send + Sync {
    /// Rasterize one cue into tiles. Returning [`RasterOutput::Empty`] is a
    /// normal outcome, not an error.
    fn render(&self, request: &RenderRequest) -> SubrastResult<RasterOutput>;
}

// Tile geometry is never trusted: dimensions and stride come from an
// external collaborator and are validated before any buffer math.
pub(crate) fn geometry_issue(width: u32, height: u32, stride: u32) -> Option<&'static str> {
    if width == 0 || height == 0 {
        return Some("degenerate dimensions");
    }
    if stride < width {
        return Some("stride smaller than width");
    }
    if u64::from(width) * u64::from(height) > MAX_TILE_PIXELS {
        return Some("pixel count exceeds sanity ceiling");
    }
    None
}

pub(crate) fn buffer_issue(
    width: u32,
    height: u32,
    stride: u32,
    buf_len: usize,
    bytes_per_px: usize,
) -> Option<&'static str> {
    let needed = u64::from(height)
        .saturating_sub(1)
        .saturating_mul(u64::from(stride))
        .saturating_add(u64::from(width))
        .saturating_mul(bytes_per_px as u64);
    if (buf_len as u64) < needed {
        return Some("pixel buffer shorter than geometry requires");
    }
    None
}

impl RgbaTile {
    pub(crate) fn geometry_issue(&self) -> Option<&'static str> {
        geometry_issue(self.width, self.height, self.stride)
    }

    pub(crate) fn buffer_issue(&self) -> Option<&'static str> {
        buffer_issue(self.width, self.height, self.stride, self.pixels.len(), 4)
    }
}

impl CoverageTile {
    pub(crate) fn geometry_issue(&self) -> Option<&'static str> {
        geometry_issue(self.width, self.height, self.stride)
    }

    pub(crate) fn buffer_issue(&self) -> Option<&'static str> {
        buffer_issue(self.width, self.height, self.stride, self.coverage.len(), 1)
    }
}
