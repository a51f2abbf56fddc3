use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::palette::registry::{Palette, PaletteMode};

/// Maximum number of materialized palettes retained at once.
pub const PALETTE_CACHE_CAPACITY: usize = 4;

/// Cache access counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaletteCacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that had to materialize a palette.
    pub misses: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    // Front is most recently used.
    entries: VecDeque<(PaletteMode, Palette)>,
    stats: PaletteCacheStats,
}

/// Mutex-guarded LRU cache of materialized palettes, shared by every render
/// worker.
///
/// Callers always receive an owned copy, so nothing aliases across threads
/// once the lock is released.
#[derive(Debug, Default)]
pub struct PaletteCache {
    inner: Mutex<CacheInner>,
}

impl PaletteCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    // A panicked worker must not take palette lookups down with it.
    fn inner(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the palette for `mode`, building and inserting it on a miss.
    ///
    /// A hit promotes the entry to most recently used; a miss evicts the
    /// least recently used entry once the cache is at capacity.
    pub fn get_or_build(&self, mode: PaletteMode) -> Palette {
        let mut inner = self.inner();

        if let Some(pos) = inner.entries.iter().position(|(m, _)| *m == mode) {
            let entry = match inner.entries.remove(pos) {
                Some(entry) => entry,
                // Unreachable: `pos` came from the same locked scan.
                None => (mode, Palette::build(mode)),
            };
            let palette = entry.1;
            inner.entries.push_front(entry);
            inner.stats.hits = inner.stats.hits.saturating_add(1);
            return palette;
        }

        let palette = Palette::build(mode);
        inner.entries.push_front((mode, palette));
        inner.stats.misses = inner.stats.misses.saturating_add(1);
        while inner.entries.len() > PALETTE_CACHE_CAPACITY {
            if let Some((evicted, _)) = inner.entries.pop_back() {
                inner.stats.evictions = inner.stats.evictions.saturating_add(1);
                tracing::debug!(mode = evicted.name(), "evicted least recently used palette");
            }
        }
        palette
    }

    /// Snapshot the access counters.
    pub fn stats(&self) -> PaletteCacheStats {
        self.inner().stats
    }

    /// Number of palettes currently cached.
    pub fn len(&self) -> usize {
        self.inner().entries.len()
    }

    /// Return `true` when nothing is cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn cached_modes(&self) -> Vec<PaletteMode> {
        self.inner().entries.iter().map(|(m, _)| *m).collect()
    }
}
