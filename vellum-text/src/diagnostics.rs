//! Cross-thread diagnostics.
//!
//! The render thread publishes counters into [`EngineStats`] after every
//! mutating engine call. Readers on other threads see plain atomics and
//! never touch the cache or atlases, so values may lag by one operation.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::manager::AtlasMemory;

/// Atomically published engine counters.
#[derive(Debug, Default)]
pub struct EngineStats {
    cache_entries: AtomicUsize,
    cache_bytes: AtomicUsize,
    glyph_atlas_bytes: AtomicUsize,
    emoji_atlas_bytes: AtomicUsize,
    rasterized: AtomicU64,
    shut_down: AtomicBool,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_entries: usize,
    pub cache_bytes: usize,
    pub glyph_atlas_bytes: usize,
    pub emoji_atlas_bytes: usize,
    pub rasterized: u64,
}

impl EngineStats {
    pub(crate) fn publish(&self, cache_entries: usize, cache_bytes: usize, memory: AtlasMemory, rasterized: u64) {
        self.cache_entries.store(cache_entries, Ordering::Relaxed);
        self.cache_bytes.store(cache_bytes, Ordering::Relaxed);
        self.glyph_atlas_bytes.store(memory.glyph_bytes, Ordering::Relaxed);
        self.emoji_atlas_bytes.store(memory.emoji_bytes, Ordering::Relaxed);
        self.rasterized.store(rasterized, Ordering::Relaxed);
    }

    pub(crate) fn mark_shut_down(&self) {
        self.shut_down.store(true, Ordering::Release);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    pub fn cache_count(&self) -> usize {
        self.cache_entries.load(Ordering::Relaxed)
    }

    pub fn cache_memory_size(&self) -> usize {
        self.cache_bytes.load(Ordering::Relaxed)
    }

    pub fn glyph_atlas_memory_size(&self) -> usize {
        self.glyph_atlas_bytes.load(Ordering::Relaxed)
    }

    pub fn emoji_atlas_memory_size(&self) -> usize {
        self.emoji_atlas_bytes.load(Ordering::Relaxed)
    }

    pub fn rasterized_total(&self) -> u64 {
        self.rasterized.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_entries: self.cache_count(),
            cache_bytes: self.cache_memory_size(),
            glyph_atlas_bytes: self.glyph_atlas_memory_size(),
            emoji_atlas_bytes: self.emoji_atlas_memory_size(),
            rasterized: self.rasterized_total(),
        }
    }

    /// The `TextLayoutEngine:` line of the debug dump.
    pub fn dump(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "{}", self.snapshot())
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextLayoutEngine: CacheCount={}", self.cache_entries)?;
        write_size(f, "CacheSize", self.cache_bytes)?;
        write_size(f, "GlyphAtlasSize", self.glyph_atlas_bytes)?;
        write_size(f, "EmojiAtlasSize", self.emoji_atlas_bytes)
    }
}

fn write_size(f: &mut fmt::Formatter<'_>, name: &str, bytes: usize) -> fmt::Result {
    write!(f, ", {name}={} ({bytes} bytes)", binary_compact(bytes))
}

/// Human-readable 1024-based size: `512 B`, `1.50 KB`, `4.00 MB`.
pub fn binary_compact(bytes: usize) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
