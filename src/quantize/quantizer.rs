use crate::foundation::core::Argb;
use crate::foundation::error::{SubrastError, SubrastResult};
use crate::palette::registry::Palette;
use crate::quantize::bitmap::Bitmap;
use crate::quantize::color_cache::ColorCache;
use crate::raster::backend::{CoverageTile, RasterOutput, RgbaTile};

/// Allocation guard for the union bounding box.
///
/// 64 MiB of index data; broadcast canvases are two orders of magnitude
/// smaller, so anything beyond this is a runaway geometry, not content.
pub const MAX_BITMAP_PIXELS: u64 = 1 << 26;

/// Result of quantizing one cue's raster output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Quantized {
    /// The indexed bitmap; empty when nothing was visible.
    pub bitmap: Bitmap,
    /// Tiles dropped whole because their geometry or buffers were invalid.
    pub tiles_skipped: u32,
}

/// Map one cue's rasterizer output onto `palette`.
///
/// Returns an empty bitmap for invisible content (a normal outcome) and an
/// error only for the allocation/overflow guard; malformed tiles are logged
/// and skipped rather than failing the cue.
pub fn quantize(output: &RasterOutput, palette: &Palette) -> SubrastResult<Quantized> {
    match output {
        RasterOutput::Empty => Ok(Quantized::default()),
        RasterOutput::Rgba(tiles) => quantize_rgba(tiles, palette),
        RasterOutput::Coverage(tiles) => quantize_coverage(tiles, palette),
    }
}

#[derive(Clone, Copy, Debug)]
struct UnionBox {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl UnionBox {
    fn of(rects: impl Iterator<Item = (i32, i32, u32, u32)>) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for (x, y, w, h) in rects {
            let (x0, y0) = (i64::from(x), i64::from(y));
            let (x1, y1) = (x0 + i64::from(w), y0 + i64::from(h));
            bounds = Some(match bounds {
                None => Self { x0, y0, x1, y1 },
                Some(b) => Self {
                    x0: b.x0.min(x0),
                    y0: b.y0.min(y0),
                    x1: b.x1.max(x1),
                    y1: b.y1.max(y1),
                },
            });
        }
        bounds
    }

    // Overflow is checked before any allocation happens.
    fn dims(&self) -> SubrastResult<(u32, u32)> {
        let w = self.x1 - self.x0;
        let h = self.y1 - self.y0;
        let pixels = (w as u64)
            .checked_mul(h as u64)
            .ok_or_else(|| SubrastError::quantize("bitmap pixel count overflows"))?;
        if w > i64::from(u32::MAX) || h > i64::from(u32::MAX) || pixels > MAX_BITMAP_PIXELS {
            return Err(SubrastError::quantize(format!(
                "union box {w}x{h} exceeds the allocation ceiling"
            )));
        }
        Ok((w as u32, h as u32))
    }
}

struct Canvas {
    width: u32,
    height: u32,
    indices: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            // Index 0 is the transparent background, so zero-fill is "blank".
            indices: vec![0u8; width as usize * height as usize],
        }
    }

    // Writes outside the canvas are clipped, never out-of-bounds.
    fn put(&mut self, x: i64, y: i64, index: u8) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        self.indices[y as usize * self.width as usize + x as usize] = index;
    }
}

fn finish(bounds: UnionBox, canvas: Canvas, palette: &Palette, tiles_skipped: u32) -> Quantized {
    Quantized {
        bitmap: Bitmap {
            width: canvas.width,
            height: canvas.height,
            origin_x: bounds.x0 as i32,
            origin_y: bounds.y0 as i32,
            indices: canvas.indices,
            palette: palette.to_vec(),
            color_count: palette.entries().len() as u8,
        },
        tiles_skipped,
    }
}

fn quantize_rgba(tiles: &[RgbaTile], palette: &Palette) -> SubrastResult<Quantized> {
    let mut skipped = 0u32;
    let usable: Vec<&RgbaTile> = tiles
        .iter()
        .filter(|tile| match tile.geometry_issue() {
            Some(reason) => {
                warn_skipped(reason, tile.x, tile.y, tile.width, tile.height);
                skipped = skipped.saturating_add(1);
                false
            }
            None => true,
        })
        .collect();

    let Some(bounds) = UnionBox::of(usable.iter().map(|t| (t.x, t.y, t.width, t.height))) else {
        return Ok(Quantized {
            bitmap: Bitmap::empty(),
            tiles_skipped: skipped,
        });
    };
    let (width, height) = bounds.dims()?;

    let mut canvas = Canvas::new(width, height);
    let mut colors = ColorCache::new();
    for tile in usable {
        if let Some(reason) = tile.buffer_issue() {
            warn_skipped(reason, tile.x, tile.y, tile.width, tile.height);
            skipped = skipped.saturating_add(1);
            continue;
        }
        for row in 0..tile.height {
            let src_row = row as usize * tile.stride as usize * 4;
            let dy = i64::from(tile.y) - bounds.y0 + i64::from(row);
            for col in 0..tile.width {
                let Some(px) = tile.pixels.get(src_row + col as usize * 4..).and_then(|s| {
                    s.get(..4)
                }) else {
                    break;
                };
                // Straight alpha: untouched pixels stay at index 0.
                if px[3] == 0 {
                    continue;
                }
                let color = Argb::new(px[3], px[0], px[1], px[2]);
                let index = colors.resolve(palette, color);
                let dx = i64::from(tile.x) - bounds.x0 + i64::from(col);
                canvas.put(dx, dy, index);
            }
        }
    }

    Ok(finish(bounds, canvas, palette, skipped))
}

fn quantize_coverage(tiles: &[CoverageTile], palette: &Palette) -> SubrastResult<Quantized> {
    let mut skipped = 0u32;
    let usable: Vec<&CoverageTile> = tiles
        .iter()
        .filter(|tile| match tile.geometry_issue() {
            Some(reason) => {
                warn_skipped(reason, tile.x, tile.y, tile.width, tile.height);
                skipped = skipped.saturating_add(1);
                false
            }
            None => true,
        })
        .collect();

    let Some(bounds) = UnionBox::of(usable.iter().map(|t| (t.x, t.y, t.width, t.height))) else {
        return Ok(Quantized {
            bitmap: Bitmap::empty(),
            tiles_skipped: skipped,
        });
    };
    let (width, height) = bounds.dims()?;

    let mut canvas = Canvas::new(width, height);
    let mut colors = ColorCache::new();
    for tile in usable {
        if let Some(reason) = tile.buffer_issue() {
            warn_skipped(reason, tile.x, tile.y, tile.width, tile.height);
            skipped = skipped.saturating_add(1);
            continue;
        }
        // One palette resolution per tile: the mask shares a single color.
        let index = colors.resolve(palette, tile.color);
        for row in 0..tile.height {
            let src_row = row as usize * tile.stride as usize;
            let dy = i64::from(tile.y) - bounds.y0 + i64::from(row);
            for col in 0..tile.width {
                let Some(&coverage) = tile.coverage.get(src_row + col as usize) else {
                    break;
                };
                if coverage == 0 {
                    continue;
                }
                let dx = i64::from(tile.x) - bounds.x0 + i64::from(col);
                canvas.put(dx, dy, index);
            }
        }
    }

    Ok(finish(bounds, canvas, palette, skipped))
}

fn warn_skipped(reason: &str, x: i32, y: i32, width: u32, height: u32) {
    tracing::warn!(reason, x, y, width, height, "skipping malformed rasterizer tile");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::registry::PaletteMode;

    const RED: Argb = Argb::new(0xFF, 0xFF, 0x00, 0x00);
    const WHITE: Argb = Argb::new(0xFF, 0xFF, 0xFF, 0xFF);

    fn palette() -> Palette {
        Palette::build(PaletteMode::Broadcast)
    }

    fn coverage_tile(x: i32, y: i32, width: u32, height: u32, color: Argb) -> CoverageTile {
        CoverageTile {
            x,
            y,
            width,
            height,
            stride: width,
            coverage: vec![0xFF; (width * height) as usize],
            color,
        }
    }

    #[test]
    fn empty_output_yields_empty_bitmap() {
        let q = quantize(&RasterOutput::Empty, &palette()).unwrap();
        assert!(q.bitmap.is_empty());
        assert_eq!(q.tiles_skipped, 0);
    }

    #[test]
    fn coverage_tile_maps_mask_to_single_index() {
        let pal = palette();
        let tile = CoverageTile {
            coverage: vec![0xFF, 0x00, 0x7F, 0x00],
            ..coverage_tile(10, 20, 2, 2, RED)
        };
        let q = quantize(&RasterOutput::Coverage(vec![tile]), &pal).unwrap();
        let red = pal.nearest(RED);
        assert_eq!((q.bitmap.width, q.bitmap.height), (2, 2));
        assert_eq!((q.bitmap.origin_x, q.bitmap.origin_y), (10, 20));
        assert_eq!(q.bitmap.indices, vec![red, 0, red, 0]);
        assert_eq!(q.bitmap.palette.len(), 16);
    }

    #[test]
    fn union_box_covers_all_tiles() {
        let pal = palette();
        let q = quantize(
            &RasterOutput::Coverage(vec![
                coverage_tile(0, 0, 2, 1, RED),
                coverage_tile(4, 3, 2, 1, WHITE),
            ]),
            &pal,
        )
        .unwrap();
        assert_eq!((q.bitmap.width, q.bitmap.height), (6, 4));
        assert_eq!((q.bitmap.origin_x, q.bitmap.origin_y), (0, 0));
        assert_eq!(q.bitmap.index_at(0, 0), Some(pal.nearest(RED)));
        assert_eq!(q.bitmap.index_at(5, 3), Some(pal.nearest(WHITE)));
        // The gap between the tiles stays transparent.
        assert_eq!(q.bitmap.index_at(3, 1), Some(0));
    }

    #[test]
    fn negative_offsets_shift_the_origin() {
        let pal = palette();
        let q = quantize(
            &RasterOutput::Coverage(vec![coverage_tile(-3, -1, 2, 2, WHITE)]),
            &pal,
        )
        .unwrap();
        assert_eq!((q.bitmap.origin_x, q.bitmap.origin_y), (-3, -1));
        assert_eq!((q.bitmap.width, q.bitmap.height), (2, 2));
    }

    #[test]
    fn malformed_tiles_are_skipped_not_fatal() {
        let pal = palette();
        let bad = CoverageTile {
            stride: 1,
            ..coverage_tile(0, 0, 2, 2, RED)
        };
        let q = quantize(
            &RasterOutput::Coverage(vec![bad, coverage_tile(0, 0, 1, 1, WHITE)]),
            &pal,
        )
        .unwrap();
        assert_eq!(q.tiles_skipped, 1);
        assert_eq!((q.bitmap.width, q.bitmap.height), (1, 1));
    }

    #[test]
    fn all_tiles_malformed_degrades_to_empty_content() {
        let pal = palette();
        let q = quantize(
            &RasterOutput::Coverage(vec![CoverageTile::default(), CoverageTile::default()]),
            &pal,
        )
        .unwrap();
        assert!(q.bitmap.is_empty());
        assert_eq!(q.tiles_skipped, 2);
    }

    #[test]
    fn short_buffer_skips_tile_at_write_time() {
        let pal = palette();
        let bad = CoverageTile {
            coverage: vec![0xFF; 3],
            ..coverage_tile(0, 0, 2, 2, RED)
        };
        let q = quantize(&RasterOutput::Coverage(vec![bad]), &pal).unwrap();
        // Geometry was fine so the union box exists, but nothing was written.
        assert_eq!(q.tiles_skipped, 1);
        assert_eq!(q.bitmap.indices, vec![0, 0, 0, 0]);
    }

    #[test]
    fn oversized_union_box_is_a_quantize_failure() {
        let pal = palette();
        let huge = CoverageTile {
            x: 0,
            y: 0,
            width: 1 << 16,
            height: 1 << 16,
            stride: 1 << 16,
            coverage: Vec::new(),
            color: WHITE,
        };
        let err = quantize(&RasterOutput::Coverage(vec![huge]), &pal).unwrap_err();
        assert!(matches!(err, SubrastError::Quantize(_)));
    }

    #[test]
    fn rgba_pixels_resolve_through_the_palette() {
        let pal = palette();
        let tile = RgbaTile {
            x: 0,
            y: 0,
            width: 2,
            height: 1,
            stride: 2,
            // One red pixel, one fully transparent pixel.
            pixels: vec![0xFF, 0x00, 0x00, 0xFF, 0x12, 0x34, 0x56, 0x00],
        };
        let q = quantize(&RasterOutput::Rgba(vec![tile]), &pal).unwrap();
        assert_eq!(q.bitmap.indices, vec![pal.nearest(RED), 0]);
    }

    #[test]
    fn every_index_stays_within_the_palette() {
        let pal = palette();
        let mut pixels = Vec::new();
        for i in 0..64u32 {
            let c = (i * 37) as u8;
            pixels.extend_from_slice(&[c, c.wrapping_mul(3), 0xFF - c, 0xFF]);
        }
        let tile = RgbaTile {
            x: 0,
            y: 0,
            width: 8,
            height: 8,
            stride: 8,
            pixels,
        };
        let q = quantize(&RasterOutput::Rgba(vec![tile]), &pal).unwrap();
        assert!(q.bitmap.palette.len() <= 16);
        assert!(
            q.bitmap
                .indices
                .iter()
                .all(|&i| (i as usize) < q.bitmap.palette.len())
        );
    }
}
