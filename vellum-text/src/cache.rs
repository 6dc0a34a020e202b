//! Layout cache: shaped text identity → positioned glyph run.
//!
//! Backed by an `lru::LruCache`, so recency refresh and eviction are O(1).
//! Two budgets apply at once: entry count and estimated bytes. Whichever is
//! exceeded first triggers eviction from the least recently used end.
//!
//! Entries are never mutated in place. A result that was built against an
//! older atlas generation is dropped the moment it is looked up.

use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;

use log::{debug, trace};
use lru::LruCache;
use rustc_hash::FxHasher;

use crate::config::CacheConfig;
use crate::engine::{TextDirection, TextStyle};
use crate::glyph::GlyphKey;
use crate::manager::AtlasGenerations;

/// Bookkeeping overhead charged per entry on top of key and value sizes.
const ENTRY_OVERHEAD: usize = 64;

/// Cache key summarizing text + style.
///
/// Hashing only feeds the precomputed hashes. Equality also compares the
/// text itself, so two equal fingerprints always lay out identically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutFingerprint {
    text_hash: u64,
    style_hash: u64,
    font_set_hash: u64,
    direction: TextDirection,
    text: Arc<str>,
}

impl LayoutFingerprint {
    pub fn new(text: &str, style: &TextStyle) -> Self {
        let mut hasher = FxHasher::default();
        text.hash(&mut hasher);
        Self {
            text_hash: hasher.finish(),
            style_hash: style.style_hash(),
            font_set_hash: style.font_set_hash(),
            direction: style.direction,
            text: Arc::from(text),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn direction(&self) -> TextDirection {
        self.direction
    }

    fn estimated_bytes(&self) -> usize {
        mem::size_of::<Self>() + self.text.len()
    }
}

impl Hash for LayoutFingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text_hash.hash(state);
        self.style_hash.hash(state);
        self.font_set_hash.hash(state);
        self.direction.hash(state);
    }
}

/// One glyph of a layout, positioned relative to the run origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionedGlyph {
    pub key: GlyphKey,
    /// Pen position in logical pixels.
    pub offset: [f32; 2],
}

/// Immutable layout output, shared between the cache and renderers.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutResult {
    glyphs: Vec<PositionedGlyph>,
    advance: f32,
    generations: AtlasGenerations,
    created_tick: u64,
}

impl LayoutResult {
    pub fn new(
        glyphs: Vec<PositionedGlyph>,
        advance: f32,
        generations: AtlasGenerations,
        created_tick: u64,
    ) -> Self {
        Self {
            glyphs,
            advance,
            generations,
            created_tick,
        }
    }

    pub fn glyphs(&self) -> &[PositionedGlyph] {
        &self.glyphs
    }

    /// Total advance width in logical pixels.
    pub fn advance(&self) -> f32 {
        self.advance
    }

    /// Atlas generations the glyph keys were resolved against.
    pub fn generations(&self) -> AtlasGenerations {
        self.generations
    }

    pub fn created_tick(&self) -> u64 {
        self.created_tick
    }

    /// Whether every referenced atlas still has the generation this layout
    /// was built against.
    #[inline]
    pub fn is_valid_for(&self, current: AtlasGenerations) -> bool {
        self.generations == current
    }

    pub fn estimated_bytes(&self) -> usize {
        mem::size_of::<Self>() + self.glyphs.len() * mem::size_of::<PositionedGlyph>()
    }
}

/// Cache counters for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheEntry {
    layout: Arc<LayoutResult>,
    last_access: u64,
    bytes: usize,
}

/// Bounded LRU cache of layout results.
pub struct LayoutCache {
    entries: LruCache<LayoutFingerprint, CacheEntry>,
    config: CacheConfig,
    /// Estimated bytes of all entries.
    bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl LayoutCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: LruCache::unbounded(),
            config,
            bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Estimated bytes held by cached entries.
    pub fn memory_size(&self) -> usize {
        self.bytes
    }

    /// Presence check without touching recency.
    pub fn contains(&self, fingerprint: &LayoutFingerprint) -> bool {
        self.entries.contains(fingerprint)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            bytes: self.bytes,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    /// Look up a layout, refreshing its recency on hit.
    ///
    /// An entry built against other atlas generations is evicted and
    /// reported as a miss.
    pub fn get(
        &mut self,
        fingerprint: &LayoutFingerprint,
        current: AtlasGenerations,
        tick: u64,
    ) -> Option<Arc<LayoutResult>> {
        let entry = match self.entries.get_mut(fingerprint) {
            Some(entry) => entry,
            None => {
                self.misses += 1;
                return None;
            }
        };

        if entry.layout.is_valid_for(current) {
            entry.last_access = tick;
            self.hits += 1;
            return Some(Arc::clone(&entry.layout));
        }

        if let Some(stale) = self.entries.pop(fingerprint) {
            self.bytes -= stale.bytes;
            self.evictions += 1;
            trace!("layout cache: dropped stale entry for {:?}", fingerprint.text());
        }
        self.misses += 1;
        None
    }

    /// Insert a layout and evict until both budgets hold.
    ///
    /// Returns `false` if the layout alone exceeds the byte budget, in which
    /// case it is not stored.
    pub fn put(&mut self, fingerprint: LayoutFingerprint, layout: Arc<LayoutResult>, tick: u64) -> bool {
        let bytes = ENTRY_OVERHEAD + fingerprint.estimated_bytes() + layout.estimated_bytes();
        if bytes > self.config.max_bytes {
            debug!(
                "layout cache: {bytes} byte layout exceeds budget of {}, not cached",
                self.config.max_bytes
            );
            if let Some(old) = self.entries.pop(&fingerprint) {
                self.bytes -= old.bytes;
            }
            return false;
        }

        let entry = CacheEntry {
            layout,
            last_access: tick,
            bytes,
        };
        if let Some(old) = self.entries.put(fingerprint, entry) {
            self.bytes -= old.bytes;
        }
        self.bytes += bytes;
        self.evict_to_budget();
        true
    }

    /// Drop every entry whose last access is before `older_than`.
    ///
    /// Walks from the least recently used end and stops at the first fresh
    /// entry, so the cost is proportional to what is evicted.
    pub fn evict_stale(&mut self, older_than: u64) -> usize {
        let mut evicted = 0;
        loop {
            let stale = matches!(
                self.entries.peek_lru(),
                Some((_, entry)) if entry.last_access < older_than
            );
            if !stale {
                break;
            }
            if let Some((_, entry)) = self.entries.pop_lru() {
                self.bytes -= entry.bytes;
                evicted += 1;
            }
        }
        self.evictions += evicted as u64;
        evicted
    }

    /// Drop all entries. Counters other than size are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.bytes = 0;
    }

    fn evict_to_budget(&mut self) {
        let mut evicted = 0u64;
        while self.entries.len() > self.config.max_entries || self.bytes > self.config.max_bytes {
            match self.entries.pop_lru() {
                Some((_, entry)) => {
                    self.bytes -= entry.bytes;
                    evicted += 1;
                }
                None => break,
            }
        }
        if evicted > 0 {
            trace!("layout cache: evicted {evicted} entries, {} remain", self.entries.len());
        }
        self.evictions += evicted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::{FontId, RenderStyle};

    const GEN: AtlasGenerations = AtlasGenerations { glyph: 0, emoji: 0 };

    fn fp(text: &str) -> LayoutFingerprint {
        LayoutFingerprint::new(text, &TextStyle::default())
    }

    fn layout(glyphs: usize, generations: AtlasGenerations) -> Arc<LayoutResult> {
        let glyphs = (0..glyphs)
            .map(|i| PositionedGlyph {
                key: GlyphKey::new(FontId(0), i as u16, 16, RenderStyle::empty()),
                offset: [i as f32 * 8.0, 0.0],
            })
            .collect();
        Arc::new(LayoutResult::new(glyphs, 0.0, generations, 0))
    }

    fn cache(max_entries: usize) -> LayoutCache {
        LayoutCache::new(CacheConfig {
            max_entries,
            max_bytes: usize::MAX,
        })
    }

    #[test]
    fn test_fingerprint_equality() {
        assert_eq!(fp("Hello"), fp("Hello"));
        assert_ne!(fp("Hello"), fp("Hellp"));

        let bold = TextStyle {
            weight: 700,
            ..TextStyle::default()
        };
        assert_ne!(fp("Hello"), LayoutFingerprint::new("Hello", &bold));

        let rtl = TextStyle {
            direction: TextDirection::RightToLeft,
            ..TextStyle::default()
        };
        assert_ne!(fp("Hello"), LayoutFingerprint::new("Hello", &rtl));
    }

    #[test]
    fn test_get_miss_then_hit() {
        let mut cache = cache(4);
        assert!(cache.get(&fp("a"), GEN, 0).is_none());
        cache.put(fp("a"), layout(1, GEN), 0);
        let hit = cache.get(&fp("a"), GEN, 1).unwrap();
        assert_eq!(hit.glyphs().len(), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let mut cache = cache(3);
        cache.put(fp("a"), layout(1, GEN), 0);
        cache.put(fp("b"), layout(1, GEN), 1);
        cache.put(fp("c"), layout(1, GEN), 2);

        // Touch "a" so "b" becomes the oldest.
        assert!(cache.get(&fp("a"), GEN, 3).is_some());
        cache.put(fp("d"), layout(1, GEN), 4);

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&fp("b")), "b was least recently used");
        assert!(cache.contains(&fp("a")));
        assert!(cache.contains(&fp("c")));
        assert!(cache.contains(&fp("d")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_insertion_order_breaks_ties() {
        let mut cache = cache(2);
        cache.put(fp("first"), layout(1, GEN), 0);
        cache.put(fp("second"), layout(1, GEN), 0);
        cache.put(fp("third"), layout(1, GEN), 0);
        assert!(!cache.contains(&fp("first")));
        assert!(cache.contains(&fp("second")));
    }

    #[test]
    fn test_never_exceeds_entry_bound() {
        let mut cache = cache(8);
        for i in 0..100 {
            cache.put(fp(&format!("text {i}")), layout(3, GEN), i);
            assert!(cache.len() <= 8);
        }
        // The newest eight survive.
        for i in 92..100 {
            assert!(cache.contains(&fp(&format!("text {i}"))));
        }
    }

    #[test]
    fn test_byte_budget() {
        let one = ENTRY_OVERHEAD + fp("x0").estimated_bytes() + layout(10, GEN).estimated_bytes();
        let mut cache = LayoutCache::new(CacheConfig {
            max_entries: 1000,
            max_bytes: one * 3,
        });
        for i in 0..10 {
            cache.put(fp(&format!("x{i}")), layout(10, GEN), i);
            assert!(cache.memory_size() <= one * 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_oversized_layout_not_cached() {
        let mut cache = LayoutCache::new(CacheConfig {
            max_entries: 10,
            max_bytes: 256,
        });
        assert!(!cache.put(fp("big"), layout(100, GEN), 0));
        assert!(cache.is_empty());
        assert_eq!(cache.memory_size(), 0);
    }

    #[test]
    fn test_replace_same_key_keeps_accounting() {
        let mut cache = cache(4);
        cache.put(fp("a"), layout(2, GEN), 0);
        let before = cache.memory_size();
        cache.put(fp("a"), layout(2, GEN), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.memory_size(), before);
    }

    #[test]
    fn test_stale_generation_is_miss_and_evicted() {
        let mut cache = cache(4);
        cache.put(fp("a"), layout(1, GEN), 0);
        let newer = AtlasGenerations { glyph: 1, emoji: 0 };
        assert!(cache.get(&fp("a"), newer, 1).is_none());
        assert!(!cache.contains(&fp("a")), "stale entry evicted eagerly");
        assert_eq!(cache.memory_size(), 0);
    }

    #[test]
    fn test_evict_stale_by_last_access() {
        let mut cache = cache(10);
        cache.put(fp("old"), layout(1, GEN), 1);
        cache.put(fp("kept"), layout(1, GEN), 2);
        cache.put(fp("new"), layout(1, GEN), 9);
        // Refresh "kept".
        cache.get(&fp("kept"), GEN, 10);

        assert_eq!(cache.evict_stale(5), 1);
        assert!(!cache.contains(&fp("old")));
        assert!(cache.contains(&fp("kept")));
        assert!(cache.contains(&fp("new")));
    }

    #[test]
    fn test_clear() {
        let mut cache = cache(4);
        cache.put(fp("a"), layout(1, GEN), 0);
        cache.put(fp("b"), layout(1, GEN), 0);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.memory_size(), 0);
    }
}
