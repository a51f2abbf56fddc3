use crate::foundation::core::Argb;
use crate::palette::registry::Palette;

/// Capacity of the per-frame color memo.
pub const COLOR_CACHE_CAPACITY: usize = 128;

/// Per-frame color -> palette-index memo.
///
/// One instance per quantized frame, never shared across frames or threads,
/// so no locking. Eviction is round-robin, not recency-based: once full the
/// write cursor wraps and overwrites the oldest slot.
#[derive(Debug, Default)]
pub(crate) struct ColorCache {
    entries: Vec<(Argb, u8)>,
    cursor: usize,
}

impl ColorCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lookup(&self, color: Argb) -> Option<u8> {
        self.entries
            .iter()
            .find(|(c, _)| *c == color)
            .map(|(_, idx)| *idx)
    }

    pub(crate) fn insert(&mut self, color: Argb, index: u8) {
        if self.entries.len() < COLOR_CACHE_CAPACITY {
            self.entries.push((color, index));
            return;
        }
        self.entries[self.cursor] = (color, index);
        self.cursor = (self.cursor + 1) % COLOR_CACHE_CAPACITY;
    }

    /// Memoized nearest-palette lookup.
    pub(crate) fn resolve(&mut self, palette: &Palette, color: Argb) -> u8 {
        if let Some(index) = self.lookup(color) {
            return index;
        }
        let index = palette.nearest(color);
        self.insert(color, index);
        index
    }
}
