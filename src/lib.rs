//! Subrast is the rasterization core of a broadcast subtitle re-encoding
//! pipeline: timed cues in, palette-indexed bitmaps with strictly monotonic
//! 90 kHz presentation timestamps out.
//!
//! The public API is pipeline-oriented:
//!
//! - Implement [`Rasterizer`] for the external text-shaping engine
//! - Create a [`CuePipeline`] from [`PipelineOpts`]
//! - Drive cues through it into a [`SubtitleSink`]
//!
//! The pieces underneath are usable on their own: [`Palette`]/[`PaletteCache`]
//! for color tables, [`quantize`] for tile-set -> [`Bitmap`] conversion,
//! [`RenderWorkerPool`] for prefetched rendering, and [`TimingReconciler`]
//! for the per-track clock domain.
#![forbid(unsafe_code)]

mod encode;
mod foundation;
mod palette;
mod quantize;
mod raster;
mod scene;
mod schedule;
mod session;
mod timing;

pub use crate::encode::sink::{InMemorySink, SinkConfig, SubtitleEvent, SubtitleSink};
pub use crate::foundation::core::{
    Argb, CueIndex, FpsRemap, PtsTicks, TICKS_PER_MS, TrackId,
};
pub use crate::foundation::error::{SubrastError, SubrastResult};
pub use crate::palette::cache::{PALETTE_CACHE_CAPACITY, PaletteCache, PaletteCacheStats};
pub use crate::palette::registry::{PALETTE_SIZE, Palette, PaletteMode};
pub use crate::quantize::bitmap::Bitmap;
pub use crate::quantize::color_cache::COLOR_CACHE_CAPACITY;
pub use crate::quantize::quantizer::{MAX_BITMAP_PIXELS, Quantized, quantize};
pub use crate::raster::backend::{
    CoverageTile, MAX_TILE_PIXELS, RasterOutput, Rasterizer, RgbaTile,
};
pub use crate::scene::cue::{Alignment, Cue, RenderRequest, RenderStyle};
pub use crate::schedule::pool::{
    JobKey, RenderCounterSnapshot, RenderWorkerPool, TryGet, WORKER_THREAD_PREFIX,
};
pub use crate::session::pipeline::{
    CuePipeline, DEFAULT_PREFETCH_WINDOW, PipelineOpts, PipelineStats,
};
pub use crate::timing::reconciler::{TimingReconciler, TrackTiming};
