//! Glyph identity and raster output.
//!
//! A [`GlyphKey`] names exactly one rasterized bitmap: the same font, glyph
//! id, pixel size and render style always produce the same pixels, so the
//! key doubles as the atlas map key.

use bitflags::bitflags;

/// Opaque font identifier assigned by the shaping backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub u32);

impl FontId {
    /// Reserved id for glyphs produced when shaping failed. Rasterizers are
    /// not expected to know it; the atlas substitutes a placeholder box.
    ///
    /// This is the id for Basic Multilingual Plane characters. Characters
    /// on plane `p` use `MISSING.0 - p`, see [`GlyphKey::missing`].
    pub const MISSING: FontId = FontId(u32::MAX);

    /// Number of Unicode planes, hence of reserved placeholder ids.
    const PLANES: u32 = 17;

    /// Whether this id marks a placeholder for an unshaped character.
    pub fn is_missing(self) -> bool {
        self.0 > u32::MAX - Self::PLANES
    }
}

bitflags! {
    /// Rendering variations that change the rasterized bitmap.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RenderStyle: u8 {
        const BOLD = 1 << 0;
        const ITALIC = 1 << 1;
        /// Colour emoji glyph. Routed to the emoji atlas.
        const EMOJI = 1 << 2;
    }
}

/// Uniquely identifies one rasterized glyph bitmap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub font: FontId,
    pub glyph_id: u16,
    /// Pixel size after display scaling.
    pub px_size: u16,
    pub style: RenderStyle,
}

impl GlyphKey {
    pub fn new(font: FontId, glyph_id: u16, px_size: u16, style: RenderStyle) -> Self {
        Self {
            font,
            glyph_id,
            px_size,
            style,
        }
    }

    /// Placeholder key for a character the shaper could not handle.
    ///
    /// The low 16 bits of the code point become the glyph id and the plane
    /// selects one of the reserved font ids, so distinct characters always
    /// get distinct keys.
    pub fn missing(ch: char, px_size: u16, style: RenderStyle) -> Self {
        let code = ch as u32;
        let font = FontId(FontId::MISSING.0 - (code >> 16));
        Self::new(font, (code & 0xFFFF) as u16, px_size, style)
    }

    #[inline]
    pub fn is_emoji(&self) -> bool {
        self.style.contains(RenderStyle::EMOJI)
    }
}

/// Pixel layout of a bitmap or atlas page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit coverage mask.
    A8,
    /// Premultiplied 8-bit RGBA.
    Rgba8,
}

impl PixelFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::A8 => 1,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Output of the font-rendering collaborator for one glyph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    /// Horizontal offset from the pen position to the left edge.
    pub left: i32,
    /// Vertical offset from the baseline to the top edge (positive is up).
    pub top: i32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl GlyphBitmap {
    /// A bitmap with no pixels (whitespace).
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            left: 0,
            top: 0,
            format: PixelFormat::A8,
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `data` holds at least `width * height` pixels.
    pub fn is_well_formed(&self) -> bool {
        let needed = self.width as usize * self.height as usize * self.format.bytes_per_pixel();
        self.data.len() >= needed
    }

    /// Hollow "missing glyph" box used whenever a real bitmap is unavailable.
    ///
    /// Sized from the key's pixel size and clamped to `max_edge`.
    pub fn placeholder(key: &GlyphKey, max_edge: u32) -> Self {
        let px = u32::from(key.px_size).max(4);
        let width = (px / 2).clamp(1, max_edge.max(1));
        let height = (px * 3 / 4).clamp(1, max_edge.max(1));
        let mut data = vec![0u8; (width * height) as usize];
        for y in 0..height {
            for x in 0..width {
                if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                    data[(y * width + x) as usize] = 255;
                }
            }
        }
        Self {
            width,
            height,
            left: 0,
            top: height as i32,
            format: PixelFormat::A8,
            data,
        }
    }
}

/// Whether `ch` is normally presented as a colour emoji.
///
/// Covers the pictographic blocks; text-presentation symbols that only turn
/// into emoji with a variation selector are left to the font.
pub fn is_emoji(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x1F1E6..=0x1F1FF | 0x2B50 | 0x2B55 | 0x231A..=0x231B
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emoji_flag_routing() {
        let plain = GlyphKey::new(FontId(1), 42, 16, RenderStyle::BOLD);
        let emoji = GlyphKey::new(FontId(1), 42, 16, RenderStyle::EMOJI);
        assert!(!plain.is_emoji());
        assert!(emoji.is_emoji());
        assert_ne!(plain, emoji);
    }

    #[test]
    fn test_placeholder_is_hollow_box() {
        let key = GlyphKey::missing('x', 16, RenderStyle::empty());
        let bmp = GlyphBitmap::placeholder(&key, 1024);
        assert_eq!((bmp.width, bmp.height), (8, 12));
        assert!(bmp.is_well_formed());
        // Corner set, centre clear.
        assert_eq!(bmp.data[0], 255);
        assert_eq!(bmp.data[(6 * 8 + 4) as usize], 0);
    }

    #[test]
    fn test_missing_keys_keep_the_plane() {
        let astral = GlyphKey::missing('\u{1F600}', 16, RenderStyle::EMOJI);
        let bmp = GlyphKey::missing('\u{F600}', 16, RenderStyle::EMOJI);
        assert_ne!(astral, bmp);
        assert_eq!(astral.glyph_id, bmp.glyph_id);
        assert!(astral.font.is_missing());
        assert!(bmp.font.is_missing());
        assert_eq!(bmp.font, FontId::MISSING);

        let last = GlyphKey::missing(char::MAX, 16, RenderStyle::empty());
        assert!(last.font.is_missing());
        assert!(!FontId(0).is_missing());
        assert!(!FontId(u32::MAX - 17).is_missing());
    }

    #[test]
    fn test_placeholder_clamped_to_page() {
        let key = GlyphKey::missing('x', 4000, RenderStyle::empty());
        let bmp = GlyphBitmap::placeholder(&key, 64);
        assert!(bmp.width <= 64 && bmp.height <= 64);
    }

    #[test]
    fn test_malformed_bitmap_detected() {
        let bmp = GlyphBitmap {
            width: 4,
            height: 4,
            left: 0,
            top: 4,
            format: PixelFormat::Rgba8,
            data: vec![0; 16],
        };
        assert!(!bmp.is_well_formed());
    }

    #[test]
    fn test_is_emoji_ranges() {
        assert!(is_emoji('😀'));
        assert!(is_emoji('☀'));
        assert!(!is_emoji('A'));
        assert!(!is_emoji('é'));
    }
}
