//! Glyph manager: routes glyph keys to the glyph or emoji atlas.
//!
//! The atlases are the source of truth; the manager only decides which one
//! a key belongs to, recovers from a full atlas, and sums memory usage.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use log::{debug, warn};

use crate::atlas::{Atlas, AtlasKind, AtlasSlot};
use crate::backend::Rasterizer;
use crate::cache::LayoutResult;
use crate::config::AtlasConfig;
use crate::error::AtlasError;
use crate::glyph::GlyphKey;

/// Generation counters of both atlases at one point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AtlasGenerations {
    pub glyph: u64,
    pub emoji: u64,
}

/// Live page storage per atlas, in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AtlasMemory {
    pub glyph_bytes: usize,
    pub emoji_bytes: usize,
}

impl AtlasMemory {
    pub fn total(&self) -> usize {
        self.glyph_bytes + self.emoji_bytes
    }
}

/// Per-glyph instance data for GPU upload.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GlyphInstance {
    /// Top-left corner in logical pixels.
    pub position: [f32; 2],
    /// Size in logical pixels.
    pub size: [f32; 2],
    /// Normalized `[u_min, v_min, u_max, v_max]` within the page.
    pub uv: [f32; 4],
    pub page: u32,
    /// 0 = glyph atlas, 1 = emoji atlas.
    pub atlas: u32,
}

impl GlyphInstance {
    /// View a buffer of instances as raw bytes for upload.
    pub fn as_bytes(instances: &[GlyphInstance]) -> &[u8] {
        bytemuck::cast_slice(instances)
    }
}

/// Owns the glyph and emoji atlases.
pub struct GlyphManager {
    glyphs: Atlas,
    emoji: Atlas,
}

impl GlyphManager {
    pub fn new(glyph_config: AtlasConfig, emoji_config: AtlasConfig) -> Self {
        Self {
            glyphs: Atlas::glyphs(glyph_config),
            emoji: Atlas::emoji(emoji_config),
        }
    }

    pub fn glyph_atlas(&self) -> &Atlas {
        &self.glyphs
    }

    pub fn emoji_atlas(&self) -> &Atlas {
        &self.emoji
    }

    pub fn glyph_atlas_mut(&mut self) -> &mut Atlas {
        &mut self.glyphs
    }

    pub fn emoji_atlas_mut(&mut self) -> &mut Atlas {
        &mut self.emoji
    }

    fn atlas_for(&self, key: &GlyphKey) -> &Atlas {
        if key.is_emoji() {
            &self.emoji
        } else {
            &self.glyphs
        }
    }

    fn atlas_for_mut(&mut self, key: &GlyphKey) -> &mut Atlas {
        if key.is_emoji() {
            &mut self.emoji
        } else {
            &mut self.glyphs
        }
    }

    /// Slot for `key`, rasterizing on first use.
    ///
    /// A full atlas is cleared and the insert retried once with the bitmap
    /// already in hand. Anything that still does not fit gets the
    /// placeholder box, so this never fails.
    pub fn resolve(&mut self, key: GlyphKey, rasterizer: &mut dyn Rasterizer) -> AtlasSlot {
        let atlas = self.atlas_for_mut(&key);
        match atlas.resolve(key, rasterizer) {
            Ok(slot) => slot,
            Err(AtlasError::Full { pages, bitmap }) => {
                warn!(
                    "{} atlas full ({pages} pages), clearing before retry",
                    atlas.kind().label()
                );
                atlas.clear();
                match atlas.insert(key, *bitmap) {
                    Ok(slot) => slot,
                    Err(e) => {
                        warn!("{} atlas: {e} after clear, using placeholder", atlas.kind().label());
                        atlas.insert_placeholder(key)
                    }
                }
            }
            Err(e @ AtlasError::GlyphTooLarge { .. }) => {
                debug!("{} atlas: {e}, using placeholder for {key:?}", atlas.kind().label());
                atlas.insert_placeholder(key)
            }
        }
    }

    /// Slot for `key` if it is already in its atlas. Never rasterizes.
    pub fn lookup(&self, key: &GlyphKey) -> Option<AtlasSlot> {
        self.atlas_for(key).get(key)
    }

    pub fn generations(&self) -> AtlasGenerations {
        AtlasGenerations {
            glyph: self.glyphs.generation(),
            emoji: self.emoji.generation(),
        }
    }

    pub fn total_memory_usage(&self) -> AtlasMemory {
        AtlasMemory {
            glyph_bytes: self.glyphs.memory_usage(),
            emoji_bytes: self.emoji.memory_usage(),
        }
    }

    /// Rasterizer invocations across both atlases.
    pub fn rasterized_total(&self) -> u64 {
        self.glyphs.rasterized_total() + self.emoji.rasterized_total()
    }

    /// Clear both atlases. Needed when the display scale changes (bitmaps
    /// must be re-rasterized at the new density) or font resources change.
    pub fn reload(&mut self) {
        self.glyphs.clear();
        self.emoji.clear();
    }

    /// Build GPU instances for `layout` placed at `origin`.
    ///
    /// Returns `None` if the layout was built against an older atlas
    /// generation; the caller must lay the text out again. Blank glyphs and
    /// glyphs no longer in their atlas are skipped. `scale` converts bitmap
    /// pixels back to logical pixels.
    pub fn build_instances(
        &self,
        layout: &LayoutResult,
        origin: [f32; 2],
        scale: f32,
    ) -> Option<Vec<GlyphInstance>> {
        if !layout.is_valid_for(self.generations()) {
            return None;
        }

        let inv_scale = 1.0 / scale;
        let mut instances = Vec::with_capacity(layout.glyphs().len());
        for glyph in layout.glyphs() {
            let atlas = self.atlas_for(&glyph.key);
            // Absent only if the layout alone overflowed the atlas.
            let Some(slot) = atlas.get(&glyph.key) else {
                continue;
            };
            if slot.is_empty() {
                continue;
            }
            let x = origin[0] + glyph.offset[0] + slot.bearing_x as f32 * inv_scale;
            let y = origin[1] + glyph.offset[1] - slot.bearing_y as f32 * inv_scale;
            instances.push(GlyphInstance {
                position: [x, y],
                size: [slot.width as f32 * inv_scale, slot.height as f32 * inv_scale],
                uv: slot.uv(atlas.page_size()),
                page: slot.page,
                atlas: match atlas.kind() {
                    AtlasKind::Glyph => 0,
                    AtlasKind::Emoji => 1,
                },
            });
        }
        Some(instances)
    }

    /// One line per atlas: format, pages, glyphs, bytes.
    pub fn dump_info(&self, out: &mut impl fmt::Write) -> fmt::Result {
        for atlas in [&self.glyphs, &self.emoji] {
            writeln!(
                out,
                "GlyphManager: {}Atlas Format={:?}, PageSize={}, Pages={}, Glyphs={}, Generation={}, MemorySize={} bytes",
                match atlas.kind() {
                    AtlasKind::Glyph => "Glyph",
                    AtlasKind::Emoji => "Emoji",
                },
                atlas.format(),
                atlas.page_size(),
                atlas.page_count(),
                atlas.glyph_count(),
                atlas.generation(),
                atlas.memory_usage(),
            )?;
        }
        Ok(())
    }
}
