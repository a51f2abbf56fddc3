use crate::foundation::core::Argb;

/// Number of entries in every materialized palette.
pub const PALETTE_SIZE: usize = 16;

/// Named palette flavor for the output subtitle stream.
///
/// Unknown mode names fall back to [`PaletteMode::Broadcast`] rather than
/// erroring, so a misconfigured orchestrator still produces output.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PaletteMode {
    /// The default 16-color broadcast lookup table.
    #[default]
    Broadcast,
    /// 15-step neutral ramp plus transparent, for monochrome displays.
    Greyscale,
    /// Fully saturated hues for accessibility.
    HighContrast,
    /// Broadcast colors at half intensity, for dark viewing rooms.
    Dim,
    /// Broadcast colors with inverted video levels.
    Inverted,
}

impl PaletteMode {
    /// Resolve a configuration string; unknown names fall back to broadcast.
    pub fn from_name(name: &str) -> Self {
        match name {
            "broadcast" => Self::Broadcast,
            "greyscale" | "grayscale" => Self::Greyscale,
            "high-contrast" | "high_contrast" => Self::HighContrast,
            "dim" => Self::Dim,
            "inverted" | "inverse" => Self::Inverted,
            _ => Self::Broadcast,
        }
    }

    /// Canonical configuration name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Greyscale => "greyscale",
            Self::HighContrast => "high-contrast",
            Self::Dim => "dim",
            Self::Inverted => "inverted",
        }
    }
}

/// A fixed 16-entry ARGB lookup table.
///
/// Entry 0 is always the transparent background.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    entries: [Argb; PALETTE_SIZE],
}

const BROADCAST: [Argb; PALETTE_SIZE] = [
    Argb::TRANSPARENT,
    Argb::new(0xFF, 0x00, 0x00, 0x00), // black
    Argb::new(0xFF, 0xFF, 0xFF, 0xFF), // white
    Argb::new(0xFF, 0xBF, 0xBF, 0xBF), // light grey
    Argb::new(0xFF, 0x7F, 0x7F, 0x7F), // mid grey
    Argb::new(0xFF, 0x3F, 0x3F, 0x3F), // dark grey
    Argb::new(0xFF, 0xFF, 0x00, 0x00), // red
    Argb::new(0xFF, 0x00, 0xFF, 0x00), // green
    Argb::new(0xFF, 0x00, 0x00, 0xFF), // blue
    Argb::new(0xFF, 0xFF, 0xFF, 0x00), // yellow
    Argb::new(0xFF, 0x00, 0xFF, 0xFF), // cyan
    Argb::new(0xFF, 0xFF, 0x00, 0xFF), // magenta
    Argb::new(0xFF, 0x7F, 0x00, 0x00), // dark red
    Argb::new(0xFF, 0x00, 0x7F, 0x00), // dark green
    Argb::new(0xFF, 0x00, 0x00, 0x7F), // dark blue
    Argb::new(0x80, 0x00, 0x00, 0x00), // translucent shadow
];

const HIGH_CONTRAST: [Argb; PALETTE_SIZE] = [
    Argb::TRANSPARENT,
    Argb::new(0xFF, 0x00, 0x00, 0x00),
    Argb::new(0xFF, 0xFF, 0xFF, 0xFF),
    Argb::new(0xFF, 0xFF, 0x00, 0x00),
    Argb::new(0xFF, 0x00, 0xFF, 0x00),
    Argb::new(0xFF, 0x00, 0x00, 0xFF),
    Argb::new(0xFF, 0xFF, 0xFF, 0x00),
    Argb::new(0xFF, 0x00, 0xFF, 0xFF),
    Argb::new(0xFF, 0xFF, 0x00, 0xFF),
    Argb::new(0xFF, 0xFF, 0x7F, 0x00), // orange
    Argb::new(0xFF, 0x7F, 0xFF, 0x00), // chartreuse
    Argb::new(0xFF, 0x00, 0xFF, 0x7F), // spring green
    Argb::new(0xFF, 0x00, 0x7F, 0xFF), // azure
    Argb::new(0xFF, 0x7F, 0x00, 0xFF), // violet
    Argb::new(0xFF, 0xFF, 0x00, 0x7F), // rose
    Argb::new(0xFF, 0x7F, 0x7F, 0x7F),
];

impl Palette {
    /// Materialize the palette for `mode`.
    ///
    /// Pure and deterministic: the same mode always yields the same table.
    pub fn build(mode: PaletteMode) -> Self {
        let entries = match mode {
            PaletteMode::Broadcast => BROADCAST,
            PaletteMode::HighContrast => HIGH_CONTRAST,
            PaletteMode::Greyscale => {
                let mut entries = [Argb::TRANSPARENT; PALETTE_SIZE];
                for (i, entry) in entries.iter_mut().enumerate().skip(1) {
                    let level = (i * 17) as u8;
                    *entry = Argb::new(0xFF, level, level, level);
                }
                entries
            }
            PaletteMode::Dim => {
                let mut entries = BROADCAST;
                for entry in entries.iter_mut().skip(1) {
                    *entry = Argb::new(entry.a(), entry.r() / 2, entry.g() / 2, entry.b() / 2);
                }
                entries
            }
            PaletteMode::Inverted => {
                let mut entries = BROADCAST;
                for entry in entries.iter_mut().skip(1) {
                    *entry = Argb::new(
                        entry.a(),
                        0xFF - entry.r(),
                        0xFF - entry.g(),
                        0xFF - entry.b(),
                    );
                }
                entries
            }
        };
        Self { entries }
    }

    /// Borrow the entry table.
    pub fn entries(&self) -> &[Argb] {
        &self.entries
    }

    /// Copy the entries into an owned vector, e.g. for a [`crate::Bitmap`].
    pub fn to_vec(&self) -> Vec<Argb> {
        self.entries.to_vec()
    }

    /// Index of the entry nearest to `color`.
    ///
    /// Linear scan over the 16 entries; ties resolve to the lowest index.
    /// Safe to call from any thread, no locking involved.
    pub fn nearest(&self, color: Argb) -> u8 {
        nearest_in(&self.entries, color)
    }
}

pub(crate) fn nearest_in(entries: &[Argb], color: Argb) -> u8 {
    let mut best = 0usize;
    let mut best_dist = u32::MAX;
    for (i, entry) in entries.iter().enumerate() {
        let dist = entry.distance_sq(color);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_is_deterministic_per_mode() {
        for mode in [
            PaletteMode::Broadcast,
            PaletteMode::Greyscale,
            PaletteMode::HighContrast,
            PaletteMode::Dim,
            PaletteMode::Inverted,
        ] {
            assert_eq!(Palette::build(mode), Palette::build(mode));
            assert_eq!(Palette::build(mode).entries().len(), PALETTE_SIZE);
            assert_eq!(Palette::build(mode).entries()[0], Argb::TRANSPARENT);
        }
    }

    #[test]
    fn unknown_mode_names_fall_back_to_broadcast() {
        assert_eq!(PaletteMode::from_name("broadcast"), PaletteMode::Broadcast);
        assert_eq!(PaletteMode::from_name("grayscale"), PaletteMode::Greyscale);
        assert_eq!(PaletteMode::from_name("sepia"), PaletteMode::Broadcast);
        assert_eq!(PaletteMode::from_name(""), PaletteMode::Broadcast);
    }

    #[test]
    fn nearest_returns_exact_match_index() {
        let palette = Palette::build(PaletteMode::Broadcast);
        for (i, &entry) in palette.entries().iter().enumerate() {
            assert_eq!(palette.nearest(entry) as usize, i);
        }
    }

    #[test]
    fn nearest_ties_resolve_to_lowest_index() {
        let entries = [
            Argb::new(0xFF, 0x00, 0x00, 0x10),
            Argb::new(0xFF, 0x00, 0x00, 0x30),
        ];
        // 0x20 is equidistant from both entries.
        assert_eq!(nearest_in(&entries, Argb::new(0xFF, 0x00, 0x00, 0x20)), 0);
    }

    #[test]
    fn translucent_pixels_sort_toward_transparency() {
        let palette = Palette::build(PaletteMode::Broadcast);
        assert_eq!(palette.nearest(Argb::new(0x05, 0x10, 0x10, 0x10)), 0);
    }
}
