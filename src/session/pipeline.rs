use std::sync::Arc;

use crate::encode::sink::{SinkConfig, SubtitleEvent, SubtitleSink};
use crate::foundation::core::{PtsTicks, TrackId};
use crate::foundation::error::{SubrastError, SubrastResult};
use crate::palette::cache::PaletteCache;
use crate::palette::registry::PaletteMode;
use crate::quantize::bitmap::Bitmap;
use crate::raster::backend::Rasterizer;
use crate::scene::cue::{Cue, RenderRequest, RenderStyle};
use crate::schedule::pool::{RenderWorkerPool, TryGet};
use crate::timing::reconciler::{TimingReconciler, TrackTiming};

/// Default number of cues submitted ahead of the one currently needed.
pub const DEFAULT_PREFETCH_WINDOW: u32 = 8;

/// Options controlling pipeline scheduling and rendering behavior.
///
/// Arrives from the orchestrator's configuration; `from_json` accepts a
/// partial document and fills the rest with defaults.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineOpts {
    /// Render worker threads; `0` renders every cue synchronously on the
    /// calling thread.
    pub render_threads: usize,
    /// Palette flavor used for quantization.
    pub palette_mode: PaletteMode,
    /// Target canvas width in pixels.
    pub canvas_width: u32,
    /// Target canvas height in pixels.
    pub canvas_height: u32,
    /// Number of cues submitted ahead on a cache miss.
    pub prefetch_window: u32,
    /// Styling forwarded to the rasterizer.
    pub style: RenderStyle,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            render_threads: 0,
            palette_mode: PaletteMode::Broadcast,
            canvas_width: 1920,
            canvas_height: 1080,
            prefetch_window: DEFAULT_PREFETCH_WINDOW,
            style: RenderStyle::default(),
        }
    }
}

impl PipelineOpts {
    /// Validate option values.
    pub fn validate(&self) -> SubrastResult<()> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(SubrastError::validation(
                "pipeline canvas dimensions must be non-zero",
            ));
        }
        Ok(())
    }

    /// Parse options from a JSON document, applying defaults for absent
    /// fields.
    pub fn from_json(json: &str) -> SubrastResult<Self> {
        let opts: Self = serde_json::from_str(json)
            .map_err(|e| SubrastError::validation(format!("invalid pipeline options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }
}

/// Aggregated pipeline counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Cues handed to the pipeline.
    pub cues_total: u64,
    /// Cues satisfied by a previously prefetched job.
    pub cues_prefetched: u64,
    /// Cues that fell back to a synchronous render.
    pub cues_rendered_sync: u64,
    /// Cues with no visible content (nothing emitted).
    pub cues_empty: u64,
    /// Rasterizer failures downgraded to empty content.
    pub render_failures: u64,
    /// Quantizer overflow failures downgraded to empty content.
    pub quantize_failures: u64,
    /// Malformed rasterizer tiles dropped whole.
    pub tiles_skipped: u64,
    /// Timestamps bumped forward to preserve monotonicity.
    pub pts_drift_bumps: u64,
}

#[derive(Clone, Copy, Debug, Default)]
struct LocalCounters {
    cues_total: u64,
    cues_prefetched: u64,
    cues_rendered_sync: u64,
    cues_empty: u64,
}

/// The orchestrator-facing subtitle rendering pipeline.
///
/// Owns the worker pool, the shared palette cache, and the per-track timing
/// reconciler. The demux/encode loop drives it one cue at a time; results go
/// to a [`SubtitleSink`] as `(bitmap, pts)` display events plus clear events
/// that terminate each cue's display.
pub struct CuePipeline {
    opts: PipelineOpts,
    pool: RenderWorkerPool,
    reconciler: TimingReconciler,
    local: LocalCounters,
}

impl CuePipeline {
    /// Build a pipeline and start its worker pool.
    pub fn new(opts: PipelineOpts, rasterizer: Arc<dyn Rasterizer>) -> SubrastResult<Self> {
        opts.validate()?;
        let palettes = Arc::new(PaletteCache::new());
        let pool = RenderWorkerPool::new(opts.render_threads, rasterizer, palettes)?;
        Ok(Self {
            opts,
            pool,
            reconciler: TimingReconciler::new(),
            local: LocalCounters::default(),
        })
    }

    /// Borrow the active options.
    pub fn opts(&self) -> &PipelineOpts {
        &self.opts
    }

    /// Sink configuration matching this pipeline's output.
    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            canvas_width: self.opts.canvas_width,
            canvas_height: self.opts.canvas_height,
            palette_mode: self.opts.palette_mode,
        }
    }

    /// Initialize (or reset) the clock for `track`.
    pub fn begin_track(&mut self, track: TrackId, timing: TrackTiming) {
        self.reconciler.begin_track(track, timing);
    }

    /// Emit the at-most-one blank event aligning `track`'s start with a
    /// reference clock (e.g. the first video frame).
    ///
    /// Returns `true` when an event was pushed.
    pub fn anchor_stream_start(
        &mut self,
        track: TrackId,
        reference: PtsTicks,
        sink: &mut dyn SubtitleSink,
    ) -> SubrastResult<bool> {
        let Some(pts) = self.reconciler.anchor_stream_start(track, reference) else {
            return Ok(false);
        };
        sink.push_event(SubtitleEvent {
            track,
            pts,
            bitmap: Bitmap::empty(),
        })?;
        Ok(true)
    }

    /// Produce the bitmap for `cues[index]` using the prefetch policy.
    ///
    /// `cues` is one track's cue list in source order. On a cache miss the
    /// pipeline submits a bounded window of upcoming cues as async jobs,
    /// re-polls once, and otherwise renders the needed cue synchronously, so
    /// the caller never waits for more than one render.
    pub fn bitmap_for(&mut self, cues: &[Cue], index: usize) -> SubrastResult<Bitmap> {
        let cue = cues
            .get(index)
            .ok_or_else(|| SubrastError::validation("cue index out of range"))?;
        let key = (cue.track, cue.index);

        if let TryGet::Ready(bitmap) = self.pool.try_get(key) {
            self.local.cues_prefetched += 1;
            return Ok(bitmap);
        }

        let window = self.opts.prefetch_window.max(1) as usize;
        let window_end = index.saturating_add(window).min(cues.len());
        for upcoming in &cues[index..window_end] {
            self.pool.submit_async(self.request_for(upcoming));
        }

        if let TryGet::Ready(bitmap) = self.pool.try_get(key) {
            self.local.cues_prefetched += 1;
            return Ok(bitmap);
        }

        self.local.cues_rendered_sync += 1;
        Ok(self.pool.render_sync(&self.request_for(cue)))
    }

    /// Render `cues[index]` and push its display and clear events.
    ///
    /// Cues with no visible content emit nothing and are only counted; the
    /// clock for `cue.track` must have been started with
    /// [`begin_track`](Self::begin_track).
    pub fn emit_cue(
        &mut self,
        cues: &[Cue],
        index: usize,
        sink: &mut dyn SubtitleSink,
    ) -> SubrastResult<()> {
        let cue = cues
            .get(index)
            .ok_or_else(|| SubrastError::validation("cue index out of range"))?;
        cue.validate()?;
        if !self.reconciler.has_track(cue.track) {
            return Err(SubrastError::timing(format!(
                "cue emitted for track {} before begin_track",
                cue.track.0
            )));
        }

        self.local.cues_total += 1;
        let bitmap = self.bitmap_for(cues, index)?;
        if bitmap.is_empty() {
            self.local.cues_empty += 1;
            return Ok(());
        }

        let pts = self.reconciler.compute_pts(cue.track, cue)?;
        let clear_pts = self.reconciler.compute_clear_pts(cue.track, cue)?;
        sink.push_event(SubtitleEvent {
            track: cue.track,
            pts,
            bitmap,
        })?;
        sink.push_event(SubtitleEvent {
            track: cue.track,
            pts: clear_pts,
            bitmap: Bitmap::empty(),
        })?;
        Ok(())
    }

    /// Drive one whole track through the pipeline into `sink`.
    ///
    /// Convenience wrapper around `begin`/anchor/`emit_cue`/`end` for the
    /// single-track case; multi-track callers sequence those pieces
    /// themselves around one shared sink.
    #[tracing::instrument(skip(self, cues, sink), fields(track = track.0, cues = cues.len()))]
    pub fn render_track(
        &mut self,
        track: TrackId,
        timing: TrackTiming,
        anchor: Option<PtsTicks>,
        cues: &[Cue],
        sink: &mut dyn SubtitleSink,
    ) -> SubrastResult<PipelineStats> {
        sink.begin(self.sink_config())?;
        self.begin_track(track, timing);
        if let Some(reference) = anchor {
            self.anchor_stream_start(track, reference, sink)?;
        }
        for index in 0..cues.len() {
            self.emit_cue(cues, index, sink)?;
        }
        sink.end()?;
        Ok(self.stats())
    }

    /// Aggregate local, pool, and timing counters.
    pub fn stats(&self) -> PipelineStats {
        let pool = self.pool.counters();
        PipelineStats {
            cues_total: self.local.cues_total,
            cues_prefetched: self.local.cues_prefetched,
            cues_rendered_sync: self.local.cues_rendered_sync,
            cues_empty: self.local.cues_empty,
            render_failures: pool.render_failures,
            quantize_failures: pool.quantize_failures,
            tiles_skipped: pool.tiles_skipped,
            pts_drift_bumps: self.reconciler.drift_bumps(),
        }
    }

    /// Shut the worker pool down; idempotent, also runs on drop.
    ///
    /// Call it before tearing down any process-wide resource the external
    /// rasterizer depends on.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }

    fn request_for(&self, cue: &Cue) -> RenderRequest {
        RenderRequest {
            track: cue.track,
            index: cue.index,
            text: cue.text.clone(),
            canvas_width: self.opts.canvas_width,
            canvas_height: self.opts.canvas_height,
            style: self.opts.style.clone(),
            alignment: cue.alignment,
            palette_mode: self.opts.palette_mode,
        }
    }
}
