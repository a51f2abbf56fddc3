use crate::foundation::core::{Argb, CueIndex, TrackId};
use crate::foundation::error::{SubrastError, SubrastResult};
use crate::palette::registry::PaletteMode;

/// One of the nine canvas anchor positions, or unset when the source format
/// does not specify one.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    BottomLeft,
    BottomCenter,
    BottomRight,
    MiddleLeft,
    MiddleCenter,
    MiddleRight,
    TopLeft,
    TopCenter,
    TopRight,
    #[default]
    Unset,
}

/// One timed subtitle entry as produced by the source parser.
///
/// Immutable once handed to the pipeline; `index` is the cue's position in
/// its track's source order and doubles as the scheduler job key.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Cue {
    /// Track the cue belongs to.
    pub track: TrackId,
    /// Sequence order within the track.
    pub index: CueIndex,
    /// Markup or plain text, interpreted by the external rasterizer.
    pub text: String,
    /// Display start in cue-local milliseconds.
    pub start_ms: i64,
    /// Display end in cue-local milliseconds.
    pub end_ms: i64,
    /// Anchor position on the target canvas.
    #[serde(default)]
    pub alignment: Alignment,
}

impl Cue {
    /// Validate the cue's time range.
    pub fn validate(&self) -> SubrastResult<()> {
        if self.end_ms < self.start_ms {
            return Err(SubrastError::validation(format!(
                "cue {}/{} ends before it starts ({} < {})",
                self.track.0, self.index.0, self.end_ms, self.start_ms
            )));
        }
        Ok(())
    }
}

/// Visual styling forwarded verbatim to the external rasterizer.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    /// Font family name.
    pub font_family: String,
    /// Font size in pixels at the target canvas resolution.
    pub font_size_px: f32,
    /// Fill color.
    pub foreground: Argb,
    /// Outline color.
    pub outline: Argb,
    /// Drop-shadow color.
    pub shadow: Argb,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_owned(),
            font_size_px: 42.0,
            foreground: Argb::new(0xFF, 0xFF, 0xFF, 0xFF),
            outline: Argb::new(0xFF, 0x00, 0x00, 0x00),
            shadow: Argb::new(0x80, 0x00, 0x00, 0x00),
        }
    }
}

/// Everything a worker needs to render one cue.
///
/// A plain value type: it is copied into the scheduler at submission time so
/// the caller's buffers can be released immediately.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderRequest {
    /// Track the cue belongs to.
    pub track: TrackId,
    /// Cue sequence order; together with `track` this is the job key.
    pub index: CueIndex,
    /// Markup or plain text to rasterize.
    pub text: String,
    /// Target canvas width in pixels.
    pub canvas_width: u32,
    /// Target canvas height in pixels.
    pub canvas_height: u32,
    /// Styling parameters.
    pub style: RenderStyle,
    /// Anchor position.
    pub alignment: Alignment,
    /// Palette the quantizer resolves colors against.
    pub palette_mode: PaletteMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue(start_ms: i64, end_ms: i64) -> Cue {
        Cue {
            track: TrackId(0),
            index: CueIndex(0),
            text: "Hi".to_owned(),
            start_ms,
            end_ms,
            alignment: Alignment::BottomCenter,
        }
    }

    #[test]
    fn cue_rejects_inverted_range() {
        assert!(cue(1000, 2000).validate().is_ok());
        assert!(cue(1000, 1000).validate().is_ok());
        assert!(cue(2000, 1000).validate().is_err());
    }

    #[test]
    fn cue_round_trips_through_json() {
        let original = cue(1000, 2000);
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Cue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn alignment_defaults_to_unset_when_absent() {
        let parsed: Cue = serde_json::from_str(
            r#"{"track":1,"index":3,"text":"x","start_ms":0,"end_ms":10}"#,
        )
        .unwrap();
        assert_eq!(parsed.alignment, Alignment::Unset);
    }
}
