//! `cosmic-text` backend: shaping via `FontSystem`, rasterization via
//! swash.
//!
//! Shaping records the swash `CacheKey` of every glyph it emits so the
//! rasterizer can later render a [`GlyphKey`] without reshaping. Images are
//! rendered uncached: the atlas already memoizes them.

use cosmic_text::{
    fontdb, Attrs, Buffer, CacheKey, Family, FontSystem, Metrics, Shaping, Style as CStyle,
    SwashCache, SwashContent, Weight,
};
use rustc_hash::FxHashMap;

use crate::backend::{Rasterizer, ShapedGlyph, Shaper};
use crate::engine::TextStyle;
use crate::error::{RasterError, ShapeError};
use crate::glyph::{is_emoji, FontId, GlyphBitmap, GlyphKey, PixelFormat, RenderStyle};

/// Line height as a multiple of font size.
const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Shaper and rasterizer backed by `cosmic-text`.
pub struct CosmicBackend {
    pub font_system: FontSystem,
    swash_cache: SwashCache,
    /// fontdb face id → stable engine font id.
    font_ids: FxHashMap<fontdb::ID, FontId>,
    /// Swash cache key of the first occurrence of each glyph key. Grows with
    /// the distinct keys shaped since the last reload.
    cache_keys: FxHashMap<GlyphKey, CacheKey>,
}

impl CosmicBackend {
    /// Create a backend with system font discovery.
    pub fn new() -> Self {
        Self::with_font_system(FontSystem::new())
    }

    pub fn with_font_system(font_system: FontSystem) -> Self {
        Self {
            font_system,
            swash_cache: SwashCache::new(),
            font_ids: FxHashMap::default(),
            cache_keys: FxHashMap::default(),
        }
    }

    /// Register font data supplied by a resource pack. The caller should
    /// `reload()` the engine afterwards.
    pub fn load_font_data(&mut self, data: Vec<u8>) {
        self.font_system.db_mut().load_font_data(data);
    }

    pub fn face_count(&self) -> usize {
        self.font_system.db().faces().count()
    }

    fn intern(&mut self, id: fontdb::ID) -> FontId {
        let next = FontId(self.font_ids.len() as u32);
        *self.font_ids.entry(id).or_insert(next)
    }
}

impl Default for CosmicBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// First family of a CSS chain, mapped to a cosmic-text family.
fn resolve_family(chain: &str) -> Family<'_> {
    let first = chain
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\''))
        .find(|s| !s.is_empty())
        .unwrap_or("sans-serif");
    match first {
        "sans-serif" => Family::SansSerif,
        "serif" => Family::Serif,
        "monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        concrete => Family::Name(concrete),
    }
}

impl Shaper for CosmicBackend {
    fn prepare(&mut self) -> Result<(), ShapeError> {
        if self.face_count() == 0 {
            return Err(ShapeError::NoFont("no system fonts discovered".into()));
        }
        log::debug!("cosmic-text backend: {} font faces available", self.face_count());
        Ok(())
    }

    fn shape(&mut self, text: &str, style: &TextStyle, scale: f32) -> Result<Vec<ShapedGlyph>, ShapeError> {
        let metrics = Metrics::new(style.font_size, style.font_size * LINE_HEIGHT_FACTOR);
        let font_style = if style.italic { CStyle::Italic } else { CStyle::Normal };
        let attrs = Attrs::new()
            .family(resolve_family(&style.family))
            .weight(Weight(style.weight))
            .style(font_style);

        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_size(&mut self.font_system, None, None);
        buffer.set_text(&mut self.font_system, text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let px_size = style.pixel_size(scale);
        let base = style.render_style();
        let mut glyphs = Vec::new();

        for run in buffer.layout_runs() {
            for (index, glyph) in run.glyphs.iter().enumerate() {
                let physical = glyph.physical((0.0, 0.0), scale);
                let emoji = run
                    .text
                    .get(glyph.start..glyph.end)
                    .is_some_and(|cluster| cluster.chars().any(is_emoji));
                let flags = if emoji { base | RenderStyle::EMOJI } else { base };

                let key = GlyphKey::new(self.intern(glyph.font_id), glyph.glyph_id, px_size, flags);
                self.cache_keys.entry(key).or_insert(physical.cache_key);

                let spacing = style.letter_spacing * index as f32;
                glyphs.push(ShapedGlyph {
                    key,
                    offset: [glyph.x + spacing, run.line_y + glyph.y],
                    advance: glyph.w + style.letter_spacing,
                });
            }
        }

        if glyphs.is_empty() && !text.trim().is_empty() {
            return Err(ShapeError::NoFont(style.family.clone()));
        }
        Ok(glyphs)
    }

    fn release_caches(&mut self) {
        // Font ids stay interned so keys remain stable across reloads.
        let released = self.cache_keys.len();
        self.cache_keys = FxHashMap::default();
        log::debug!("cosmic-text backend: released {released} glyph cache keys");
    }
}

impl Rasterizer for CosmicBackend {
    fn rasterize(&mut self, key: &GlyphKey) -> Result<GlyphBitmap, RasterError> {
        let cache_key = *self
            .cache_keys
            .get(key)
            .ok_or(RasterError::UnknownFont { glyph_id: key.glyph_id })?;

        let image = self
            .swash_cache
            .get_image_uncached(&mut self.font_system, cache_key)
            .ok_or(RasterError::NoImage { glyph_id: key.glyph_id })?;

        let format = match image.content {
            SwashContent::Mask => PixelFormat::A8,
            SwashContent::Color | SwashContent::SubpixelMask => PixelFormat::Rgba8,
        };
        Ok(GlyphBitmap {
            width: image.placement.width,
            height: image.placement.height,
            left: image.placement.left,
            top: image.placement.top,
            format,
            data: image.data,
        })
    }
}
