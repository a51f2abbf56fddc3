use crate::foundation::core::{PtsTicks, TrackId};
use crate::foundation::error::SubrastResult;
use crate::palette::registry::PaletteMode;
use crate::quantize::bitmap::Bitmap;

/// Configuration provided to a [`SubtitleSink`] before any events are pushed.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SinkConfig {
    /// Target canvas width in pixels.
    pub canvas_width: u32,
    /// Target canvas height in pixels.
    pub canvas_height: u32,
    /// Palette flavor every pushed bitmap was quantized against.
    pub palette_mode: PaletteMode,
}

/// One encoder-bound subtitle event.
///
/// An empty bitmap is a clear (or stream-anchor) event: it terminates
/// whatever the track currently displays. The bitmap is handed over with
/// full ownership; the consumer turns it into bitstream data.
#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleEvent {
    /// Track the event belongs to.
    pub track: TrackId,
    /// Presentation timestamp in the muxer's 90 kHz clock domain.
    pub pts: PtsTicks,
    /// Indexed bitmap; empty for clear events.
    pub bitmap: Bitmap,
}

impl SubtitleEvent {
    /// Return `true` for clear/blank events.
    pub fn is_clear(&self) -> bool {
        self.bitmap.is_empty()
    }
}

/// The external muxer/encoder boundary.
///
/// Ordering contract: `push_event` is called with strictly increasing `pts`
/// per track.
pub trait SubtitleSink: Send {
    /// Called once before any events are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> SubrastResult<()>;
    /// Push one event; the sink takes ownership of the bitmap.
    fn push_event(&mut self, event: SubtitleEvent) -> SubrastResult<()>;
    /// Called once after the last event.
    fn end(&mut self) -> SubrastResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    events: Vec<SubtitleEvent>,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg.clone()
    }

    /// Borrow the captured events.
    pub fn events(&self) -> &[SubtitleEvent] {
        &self.events
    }
}

impl SubtitleSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> SubrastResult<()> {
        self.cfg = Some(cfg);
        self.events.clear();
        Ok(())
    }

    fn push_event(&mut self, event: SubtitleEvent) -> SubrastResult<()> {
        self.events.push(event);
        Ok(())
    }

    fn end(&mut self) -> SubrastResult<()> {
        Ok(())
    }
}
