use std::collections::HashMap;

use crate::foundation::core::{FpsRemap, PtsTicks, TrackId};
use crate::foundation::error::{SubrastError, SubrastResult};
use crate::scene::cue::Cue;

/// Per-track timing configuration supplied by the orchestrator.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrackTiming {
    /// User delay added to every cue timestamp, in milliseconds.
    pub delay_ms: i64,
    /// Optional source -> destination frame-rate remap.
    pub fps_remap: Option<FpsRemap>,
}

// One clock per track, alive for the track's lifetime.
#[derive(Clone, Copy, Debug, Default)]
struct TrackClockState {
    last_emitted_pts: Option<PtsTicks>,
    first_cue_pts: Option<PtsTicks>,
    anchored: bool,
    timing: TrackTiming,
}

/// Converts cue-local millisecond times into strictly monotonic 90 kHz
/// presentation timestamps, one clock domain per subtitle track.
///
/// All arithmetic is integer ticks; only the fps-remap multiply is floating
/// point, rounded to nearest immediately, so a long-running stream cannot
/// accumulate drift.
#[derive(Debug, Default)]
pub struct TimingReconciler {
    tracks: HashMap<TrackId, TrackClockState>,
    drift_bumps: u64,
}

impl TimingReconciler {
    /// Create a reconciler with no tracks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-initialize the clock state for `track`.
    ///
    /// Calling it again for a known track resets the clock, which also
    /// resets the monotonicity floor.
    pub fn begin_track(&mut self, track: TrackId, timing: TrackTiming) {
        self.tracks.insert(
            track,
            TrackClockState {
                timing,
                ..TrackClockState::default()
            },
        );
    }

    /// Output timestamp for displaying `cue`.
    pub fn compute_pts(&mut self, track: TrackId, cue: &Cue) -> SubrastResult<PtsTicks> {
        self.emit(track, cue.start_ms)
    }

    /// Output timestamp for the clear event that ends `cue`'s display.
    pub fn compute_clear_pts(&mut self, track: TrackId, cue: &Cue) -> SubrastResult<PtsTicks> {
        self.emit(track, cue.end_ms)
    }

    /// Align the output track's start with a reference clock.
    ///
    /// Before any cue has been emitted for `track`, returns the timestamp
    /// for a minimal blank event one tick after `reference` (e.g. the first
    /// video frame) and records it; afterwards, or on a second call, returns
    /// `None`. At most one anchor per track.
    pub fn anchor_stream_start(
        &mut self,
        track: TrackId,
        reference: PtsTicks,
    ) -> Option<PtsTicks> {
        let state = self.tracks.get_mut(&track)?;
        if state.anchored || state.first_cue_pts.is_some() {
            return None;
        }
        state.anchored = true;
        let pts = reference.next_tick();
        state.last_emitted_pts = Some(pts);
        Some(pts)
    }

    /// Return `true` once `track` has been started with `begin_track`.
    pub fn has_track(&self, track: TrackId) -> bool {
        self.tracks.contains_key(&track)
    }

    /// Last timestamp handed out for `track`, if any.
    pub fn last_emitted(&self, track: TrackId) -> Option<PtsTicks> {
        self.tracks.get(&track).and_then(|s| s.last_emitted_pts)
    }

    /// First pre-bump cue timestamp seen for `track`, if any.
    pub fn first_cue_pts(&self, track: TrackId) -> Option<PtsTicks> {
        self.tracks.get(&track).and_then(|s| s.first_cue_pts)
    }

    /// Number of timestamps that had to be bumped forward to stay monotonic.
    pub fn drift_bumps(&self) -> u64 {
        self.drift_bumps
    }

    fn emit(&mut self, track: TrackId, ms: i64) -> SubrastResult<PtsTicks> {
        let state = self.tracks.get_mut(&track).ok_or_else(|| {
            SubrastError::timing(format!(
                "timestamp requested for track {} before begin_track",
                track.0
            ))
        })?;

        let scaled_ms = match state.timing.fps_remap {
            Some(remap) if !remap.is_identity() => (ms as f64 * remap.scale()).round() as i64,
            _ => ms,
        };
        let mut pts = PtsTicks::from_ms(scaled_ms.saturating_add(state.timing.delay_ms));

        if state.first_cue_pts.is_none() {
            state.first_cue_pts = Some(pts);
        }

        if let Some(last) = state.last_emitted_pts
            && pts <= last
        {
            // Collisions are corrected silently, one tick forward, and
            // surfaced through the drift counter.
            pts = last.next_tick();
            self.drift_bumps = self.drift_bumps.saturating_add(1);
            tracing::debug!(
                track = track.0,
                pts = pts.0,
                "bumped colliding timestamp forward one tick"
            );
        }

        state.last_emitted_pts = Some(pts);
        Ok(pts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::CueIndex;
    use crate::scene::cue::Alignment;

    fn cue(start_ms: i64, end_ms: i64) -> Cue {
        Cue {
            track: TrackId(0),
            index: CueIndex(0),
            text: "x".to_owned(),
            start_ms,
            end_ms,
            alignment: Alignment::Unset,
        }
    }

    #[test]
    fn pts_needs_begin_track_first() {
        let mut clock = TimingReconciler::new();
        assert!(clock.compute_pts(TrackId(0), &cue(0, 100)).is_err());
    }

    #[test]
    fn delay_and_clock_conversion_apply() {
        let mut clock = TimingReconciler::new();
        clock.begin_track(
            TrackId(0),
            TrackTiming {
                delay_ms: 500,
                fps_remap: None,
            },
        );
        let pts = clock.compute_pts(TrackId(0), &cue(1000, 2000)).unwrap();
        assert_eq!(pts, PtsTicks(135_000));
        let clear = clock.compute_clear_pts(TrackId(0), &cue(1000, 2000)).unwrap();
        assert_eq!(clear, PtsTicks(225_000));
    }

    #[test]
    fn fps_remap_scales_before_delay() {
        let mut clock = TimingReconciler::new();
        clock.begin_track(
            TrackId(0),
            TrackTiming {
                delay_ms: 10,
                fps_remap: Some(FpsRemap::new(25.0, 50.0).unwrap()),
            },
        );
        // 1000 ms scaled by 0.5 -> 500 ms, plus 10 ms delay.
        let pts = clock.compute_pts(TrackId(0), &cue(1000, 2000)).unwrap();
        assert_eq!(pts, PtsTicks(510 * 90));
    }

    #[test]
    fn equal_and_decreasing_inputs_stay_strictly_increasing() {
        let mut clock = TimingReconciler::new();
        clock.begin_track(TrackId(0), TrackTiming::default());
        let inputs = [1000i64, 1000, 999, 500, 1000, 1001];
        let mut produced = Vec::new();
        for start in inputs {
            produced.push(clock.compute_pts(TrackId(0), &cue(start, start + 1)).unwrap());
        }
        for pair in produced.windows(2) {
            assert!(pair[1] > pair[0], "pts must strictly increase: {produced:?}");
        }
        assert_eq!(clock.drift_bumps(), 4);
    }

    #[test]
    fn end_to_end_scenario_matches_expected_ticks() {
        let mut clock = TimingReconciler::new();
        clock.begin_track(
            TrackId(0),
            TrackTiming {
                delay_ms: 500,
                fps_remap: None,
            },
        );

        let first = cue(1000, 2000);
        let second = cue(2000, 3000);

        assert_eq!(clock.compute_pts(TrackId(0), &first).unwrap(), PtsTicks(135_000));
        assert_eq!(
            clock.compute_clear_pts(TrackId(0), &first).unwrap(),
            PtsTicks(225_000)
        );
        // The second cue lands exactly on the clear event and bumps one tick.
        assert_eq!(
            clock.compute_pts(TrackId(0), &second).unwrap(),
            PtsTicks(225_001)
        );
        assert_eq!(
            clock.compute_clear_pts(TrackId(0), &second).unwrap(),
            PtsTicks(315_000)
        );
        assert_eq!(clock.drift_bumps(), 1);
    }

    #[test]
    fn tracks_have_independent_clocks() {
        let mut clock = TimingReconciler::new();
        clock.begin_track(TrackId(0), TrackTiming::default());
        clock.begin_track(TrackId(1), TrackTiming::default());
        clock.compute_pts(TrackId(0), &cue(5000, 6000)).unwrap();
        // Track 1 is unaffected by track 0's floor.
        let pts = clock.compute_pts(TrackId(1), &cue(0, 100)).unwrap();
        assert_eq!(pts, PtsTicks(0));
        assert_eq!(clock.drift_bumps(), 0);
    }

    #[test]
    fn anchor_fires_once_and_only_before_cues() {
        let mut clock = TimingReconciler::new();
        clock.begin_track(TrackId(0), TrackTiming::default());

        let anchor = clock.anchor_stream_start(TrackId(0), PtsTicks(900));
        assert_eq!(anchor, Some(PtsTicks(901)));
        assert_eq!(clock.anchor_stream_start(TrackId(0), PtsTicks(900)), None);

        // The anchor participates in the monotonicity floor.
        let pts = clock.compute_pts(TrackId(0), &cue(0, 100)).unwrap();
        assert_eq!(pts, PtsTicks(902));

        // A track that already emitted cues cannot be anchored.
        clock.begin_track(TrackId(1), TrackTiming::default());
        clock.compute_pts(TrackId(1), &cue(0, 100)).unwrap();
        assert_eq!(clock.anchor_stream_start(TrackId(1), PtsTicks(0)), None);
    }

    #[test]
    fn anchor_on_unknown_track_is_none() {
        let mut clock = TimingReconciler::new();
        assert_eq!(clock.anchor_stream_start(TrackId(7), PtsTicks(0)), None);
    }
}
