//! Glyph atlas: paged texture atlas for glyph bitmaps.
//!
//! Uses a row-based "shelf" packing algorithm on the newest page. A cursor
//! advances left to right across the current row; a row is as tall as the
//! tallest glyph placed on it so far and never shrinks. When a glyph does
//! not fit the row a new row is started below it, and when the new row
//! does not fit the page a new page is started, up to `max_pages`.
//!
//! Slots are never freed individually. [`Atlas::clear`] drops every page at
//! once and bumps the generation counter, which is how cached layouts find
//! out that the slots they reference are gone.

use log::{debug, info, warn};
use rustc_hash::FxHashMap;

use crate::backend::Rasterizer;
use crate::config::AtlasConfig;
use crate::error::AtlasError;
use crate::glyph::{GlyphBitmap, GlyphKey, PixelFormat};

/// Location of one glyph bitmap inside an atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasSlot {
    /// Page index within the owning atlas.
    pub page: u32,
    /// Top-left corner in pixels.
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Bitmap placement relative to the pen position (see [`GlyphBitmap`]).
    pub bearing_x: i32,
    pub bearing_y: i32,
    /// Generation of the atlas when this slot was issued.
    pub generation: u64,
}

impl AtlasSlot {
    /// Slot for a glyph with no pixels.
    pub fn empty(generation: u64) -> Self {
        Self {
            page: 0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            bearing_x: 0,
            bearing_y: 0,
            generation,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Normalized `[u_min, v_min, u_max, v_max]` within a page.
    pub fn uv(&self, page_size: u32) -> [f32; 4] {
        let inv = 1.0 / page_size as f32;
        [
            self.x as f32 * inv,
            self.y as f32 * inv,
            (self.x + self.width) as f32 * inv,
            (self.y + self.height) as f32 * inv,
        ]
    }

    /// Rectangle intersection on the same page. Empty slots overlap nothing.
    pub fn overlaps(&self, other: &AtlasSlot) -> bool {
        if self.page != other.page || self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Which glyphs an atlas holds. Decides the page pixel format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtlasKind {
    Glyph,
    Emoji,
}

impl AtlasKind {
    pub fn format(self) -> PixelFormat {
        match self {
            AtlasKind::Glyph => PixelFormat::A8,
            AtlasKind::Emoji => PixelFormat::Rgba8,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AtlasKind::Glyph => "glyph",
            AtlasKind::Emoji => "emoji",
        }
    }
}

/// One texture page.
pub struct AtlasPage {
    /// Pixel data (`page_size * page_size * bpp` bytes).
    pub data: Vec<u8>,
    /// Whether data has changed since last GPU upload.
    pub dirty: bool,
}

/// Packing cursor on the newest page.
#[derive(Clone, Copy, Debug, Default)]
struct Cursor {
    x: u32,
    row_y: u32,
    row_height: u32,
}

enum Placement {
    Placed { page: usize, x: u32, y: u32 },
    Full,
    TooLarge,
}

/// Paged glyph texture atlas.
pub struct Atlas {
    kind: AtlasKind,
    config: AtlasConfig,
    pages: Vec<AtlasPage>,
    cursor: Cursor,
    /// Glyph key → slot mapping.
    slots: FxHashMap<GlyphKey, AtlasSlot>,
    generation: u64,
    /// Sum of live page sizes.
    memory_bytes: usize,
    /// Rasterizer invocations since creation.
    rasterized: u64,
}

impl Atlas {
    /// Create an empty atlas. No page is allocated until the first glyph.
    pub fn new(kind: AtlasKind, config: AtlasConfig) -> Self {
        Self {
            kind,
            config,
            pages: Vec::new(),
            cursor: Cursor::default(),
            slots: FxHashMap::default(),
            generation: 0,
            memory_bytes: 0,
            rasterized: 0,
        }
    }

    /// Glyph atlas: 8-bit coverage pages.
    pub fn glyphs(config: AtlasConfig) -> Self {
        Self::new(AtlasKind::Glyph, config)
    }

    /// Emoji atlas: RGBA pages.
    pub fn emoji(config: AtlasConfig) -> Self {
        Self::new(AtlasKind::Emoji, config)
    }

    pub fn kind(&self) -> AtlasKind {
        self.kind
    }

    pub fn format(&self) -> PixelFormat {
        self.kind.format()
    }

    pub fn page_size(&self) -> u32 {
        self.config.page_size
    }

    /// Number of glyphs currently in the atlas.
    pub fn glyph_count(&self) -> usize {
        self.slots.len()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[AtlasPage] {
        &self.pages
    }

    /// Mark a page as uploaded.
    pub fn mark_clean(&mut self, page: usize) {
        if let Some(page) = self.pages.get_mut(page) {
            page.dirty = false;
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bytes held by live pages.
    pub fn memory_usage(&self) -> usize {
        self.memory_bytes
    }

    /// Rasterizer invocations since creation.
    pub fn rasterized_total(&self) -> u64 {
        self.rasterized
    }

    pub fn slots(&self) -> impl Iterator<Item = (&GlyphKey, &AtlasSlot)> {
        self.slots.iter()
    }

    /// Look up a previously inserted glyph.
    pub fn get(&self, key: &GlyphKey) -> Option<AtlasSlot> {
        self.slots.get(key).copied()
    }

    /// Return the slot for `key`, rasterizing and packing it on first use.
    ///
    /// Rasterization failures are memoized as a placeholder box, so the
    /// rasterizer sees each key at most once between clears.
    pub fn resolve(
        &mut self,
        key: GlyphKey,
        rasterizer: &mut dyn Rasterizer,
    ) -> Result<AtlasSlot, AtlasError> {
        if let Some(slot) = self.get(&key) {
            return Ok(slot);
        }

        self.rasterized += 1;
        let bitmap = match rasterizer.rasterize(&key) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                debug!("{} atlas: rasterizing {key:?} failed ({e}), using placeholder", self.kind.label());
                self.placeholder_bitmap(&key)
            }
        };
        self.insert(key, bitmap)
    }

    /// Pack an already rasterized bitmap.
    ///
    /// Returns the existing slot if `key` is present. A bitmap whose data is
    /// shorter than its dimensions claim is replaced by the placeholder box.
    pub fn insert(&mut self, key: GlyphKey, bitmap: GlyphBitmap) -> Result<AtlasSlot, AtlasError> {
        if let Some(slot) = self.get(&key) {
            return Ok(slot);
        }

        let bitmap = if bitmap.is_well_formed() {
            bitmap
        } else {
            warn!(
                "{} atlas: malformed {}x{} bitmap for {key:?}, using placeholder",
                self.kind.label(),
                bitmap.width,
                bitmap.height
            );
            self.placeholder_bitmap(&key)
        };

        if bitmap.is_empty() {
            let slot = AtlasSlot {
                bearing_x: bitmap.left,
                bearing_y: bitmap.top,
                ..AtlasSlot::empty(self.generation)
            };
            self.slots.insert(key, slot);
            return Ok(slot);
        }

        let (page, x, y) = match self.allocate(bitmap.width, bitmap.height) {
            Placement::Placed { page, x, y } => (page, x, y),
            Placement::Full => {
                return Err(AtlasError::Full {
                    pages: self.pages.len(),
                    bitmap: Box::new(bitmap),
                })
            }
            Placement::TooLarge => {
                return Err(AtlasError::GlyphTooLarge {
                    width: bitmap.width,
                    height: bitmap.height,
                    page_size: self.config.page_size,
                })
            }
        };

        self.blit(page, x, y, &bitmap);

        let slot = AtlasSlot {
            page: page as u32,
            x,
            y,
            width: bitmap.width,
            height: bitmap.height,
            bearing_x: bitmap.left,
            bearing_y: bitmap.top,
            generation: self.generation,
        };
        self.slots.insert(key, slot);
        Ok(slot)
    }

    /// Store the placeholder box under `key`. Never fails: if even the
    /// placeholder does not fit, an empty slot is memoized instead.
    pub fn insert_placeholder(&mut self, key: GlyphKey) -> AtlasSlot {
        if let Some(slot) = self.get(&key) {
            return slot;
        }
        let bitmap = self.placeholder_bitmap(&key);
        match self.insert(key, bitmap) {
            Ok(slot) => slot,
            Err(e) => {
                warn!("{} atlas: no room for placeholder of {key:?}: {e}", self.kind.label());
                let slot = AtlasSlot::empty(self.generation);
                self.slots.insert(key, slot);
                slot
            }
        }
    }

    /// Reset the atlas: release every page, forget every slot and bump the
    /// generation. Previously issued slots become stale.
    pub fn clear(&mut self) {
        let released = self.memory_bytes;
        let glyphs = self.slots.len();
        self.pages = Vec::new();
        self.slots = FxHashMap::default();
        self.cursor = Cursor::default();
        self.memory_bytes = 0;
        self.generation += 1;
        info!(
            "{} atlas cleared: {glyphs} glyphs, {released} bytes released, generation {}",
            self.kind.label(),
            self.generation
        );
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    fn placeholder_bitmap(&self, key: &GlyphKey) -> GlyphBitmap {
        GlyphBitmap::placeholder(key, self.config.page_size.saturating_sub(self.config.padding))
    }

    /// Find room for a `width x height` bitmap on the newest page, or open a
    /// new page.
    fn allocate(&mut self, width: u32, height: u32) -> Placement {
        let size = self.config.page_size;
        let padded_w = width + self.config.padding;
        let padded_h = height + self.config.padding;

        if padded_w > size || padded_h > size {
            return Placement::TooLarge;
        }

        if let Some(page) = self.pages.len().checked_sub(1) {
            let cursor = &mut self.cursor;
            if cursor.x + padded_w > size {
                cursor.row_y += cursor.row_height;
                cursor.x = 0;
                cursor.row_height = 0;
            }
            if cursor.row_y + padded_h <= size {
                let placed = Placement::Placed {
                    page,
                    x: cursor.x,
                    y: cursor.row_y,
                };
                cursor.x += padded_w;
                cursor.row_height = cursor.row_height.max(padded_h);
                return placed;
            }
        }

        if self.pages.len() >= self.config.max_pages {
            return Placement::Full;
        }

        let page_bytes = self.config.page_bytes(self.format());
        self.pages.push(AtlasPage {
            data: vec![0u8; page_bytes],
            dirty: true,
        });
        self.memory_bytes += page_bytes;
        debug!(
            "{} atlas: opened page {} ({page_bytes} bytes, {} total)",
            self.kind.label(),
            self.pages.len() - 1,
            self.memory_bytes
        );

        self.cursor = Cursor {
            x: padded_w,
            row_y: 0,
            row_height: padded_h,
        };
        Placement::Placed {
            page: self.pages.len() - 1,
            x: 0,
            y: 0,
        }
    }

    /// Copy bitmap rows into a page, converting between coverage and RGBA.
    fn blit(&mut self, page: usize, x: u32, y: u32, bitmap: &GlyphBitmap) {
        let size = self.config.page_size as usize;
        let dst_format = self.format();
        let dst_bpp = dst_format.bytes_per_pixel();
        let src_bpp = bitmap.format.bytes_per_pixel();
        let width = bitmap.width as usize;
        let page = &mut self.pages[page];

        for row in 0..bitmap.height as usize {
            let src = &bitmap.data[row * width * src_bpp..(row + 1) * width * src_bpp];
            let start = ((y as usize + row) * size + x as usize) * dst_bpp;
            let dst = &mut page.data[start..start + width * dst_bpp];

            match (bitmap.format, dst_format) {
                (PixelFormat::A8, PixelFormat::A8) | (PixelFormat::Rgba8, PixelFormat::Rgba8) => {
                    dst.copy_from_slice(src);
                }
                // White glyph with alpha, premultiplied.
                (PixelFormat::A8, PixelFormat::Rgba8) => {
                    for (px, &alpha) in dst.chunks_exact_mut(4).zip(src) {
                        px.copy_from_slice(&[alpha, alpha, alpha, alpha]);
                    }
                }
                (PixelFormat::Rgba8, PixelFormat::A8) => {
                    for (px, rgba) in dst.iter_mut().zip(src.chunks_exact(4)) {
                        *px = rgba[3];
                    }
                }
            }
        }
        page.dirty = true;
    }
}

// ===================================================================
// Tests
// ===================================================================
